//! Per-group contribution and demand statistics.
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::{MIN_STD_DEGREES_OF_FREEDOM, NOT_AVAILABLE};
use crate::matching::{Group, GroupLabel};
use crate::numbers::{clamped_sqrt, usize_to_f64};

/// A statistic that may be undefined.
///
/// Serializes as a number, or as the string `"NA"` when the sample is too
/// small or the feature is not tracked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatValue {
    Value(f64),
    NotAvailable,
}

impl StatValue {
    #[must_use]
    pub const fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::NotAvailable => None,
        }
    }

    #[must_use]
    pub const fn is_available(self) -> bool {
        matches!(self, Self::Value(_))
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v:.2}"),
            Self::NotAvailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

impl Serialize for StatValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => serializer.serialize_f64(*v),
            Self::NotAvailable => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

impl<'de> Deserialize<'de> for StatValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(v) => Ok(Self::Value(v)),
            Raw::Text(text) if text == NOT_AVAILABLE => Ok(Self::NotAvailable),
            Raw::Text(text) => Err(de::Error::invalid_value(
                de::Unexpected::Str(&text),
                &"a number or \"NA\"",
            )),
        }
    }
}

/// Aggregates for one group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub avg_contribution: f64,
    pub std_contribution: StatValue,
    pub avg_demand: StatValue,
    pub std_demand: StatValue,
}

/// Group statistics keyed by group label.
pub type GroupStatsTable = BTreeMap<GroupLabel, GroupStats>;

#[derive(Debug, Default, Clone, Copy)]
struct Moments {
    sum: f64,
    sum_squares: f64,
}

impl Moments {
    fn push(&mut self, x: f64) {
        self.sum += x;
        self.sum_squares += x * x;
    }

    fn mean(self, n: usize) -> f64 {
        self.sum / usize_to_f64(n)
    }

    /// Unbiased sample standard deviation; NA below two degrees of freedom.
    fn sample_std(self, n: usize) -> StatValue {
        let df = n.saturating_sub(1);
        if df <= MIN_STD_DEGREES_OF_FREEDOM {
            return StatValue::NotAvailable;
        }
        let n_f = usize_to_f64(n);
        let radicand = (self.sum_squares - self.sum * self.sum / n_f) / usize_to_f64(df);
        StatValue::Value(clamped_sqrt(radicand))
    }
}

/// Compute the statistics of one non-empty group.
///
/// Members without a demand count as zero demand when demand is tracked.
#[must_use]
pub fn group_stats(group: &Group, demand_tracked: bool) -> GroupStats {
    let n = group.len();
    let mut contribution = Moments::default();
    let mut demand = Moments::default();
    for member in &group.members {
        contribution.push(member.contribution());
        if demand_tracked {
            demand.push(member.demand().unwrap_or(0.0));
        }
    }

    let (avg_demand, std_demand) = if demand_tracked && n > 0 {
        (StatValue::Value(demand.mean(n)), demand.sample_std(n))
    } else {
        (StatValue::NotAvailable, StatValue::NotAvailable)
    };

    GroupStats {
        avg_contribution: if n == 0 { 0.0 } else { contribution.mean(n) },
        std_contribution: contribution.sample_std(n),
        avg_demand,
        std_demand,
    }
}

/// Compute statistics for every group of a matching.
#[must_use]
pub fn compute_group_stats(groups: &[Group], demand_tracked: bool) -> GroupStatsTable {
    groups
        .iter()
        .map(|group| (group.label.clone(), group_stats(group, demand_tracked)))
        .collect()
}
