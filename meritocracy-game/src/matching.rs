//! Ladder matching: contiguous fixed-size groups cut from the ranking.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::config::SettlementConfig;
use crate::error::ConfigError;
use crate::ranking::RankedEntry;
use crate::submission::PlayerId;

pub type GroupLabel = String;

/// `[contribution, demand]` pair shown to clients for one group member.
pub type Bar = (f64, Option<f64>);

/// Bars of one group in member order.
pub type GroupBars = SmallVec<[Bar; 4]>;

/// Where a player landed: group index, group label and slot within the group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub group: usize,
    pub label: GroupLabel,
    pub slot: usize,
}

impl Position {
    /// `[group, slot]` index pair used to address the bars.
    #[must_use]
    pub const fn indices(&self) -> [usize; 2] {
        [self.group, self.slot]
    }
}

/// A ranked entry after partitioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedEntry {
    pub entry: RankedEntry,
    pub position: Position,
}

impl PlacedEntry {
    #[must_use]
    pub const fn player(&self) -> &PlayerId {
        &self.entry.submission.player
    }

    #[must_use]
    pub const fn contribution(&self) -> f64 {
        self.entry.submission.contribution
    }

    #[must_use]
    pub const fn demand(&self) -> Option<f64> {
        self.entry.submission.demand
    }
}

/// One block of consecutively ranked players sharing a pooled account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub label: GroupLabel,
    pub members: Vec<PlacedEntry>,
}

impl Group {
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Sum of member contributions.
    #[must_use]
    pub fn account_total(&self) -> f64 {
        self.members.iter().map(PlacedEntry::contribution).sum()
    }
}

/// Result of ladder matching one ranking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Matching {
    /// Player ids from top to bottom.
    pub ranking: Vec<PlayerId>,
    pub groups: Vec<Group>,
    /// Per-group `[contribution, demand]` pairs mirroring member order.
    pub bars: Vec<GroupBars>,
}

impl Matching {
    /// Iterate every placed entry in ranking order.
    pub fn entries(&self) -> impl Iterator<Item = &PlacedEntry> {
        self.groups.iter().flat_map(|group| group.members.iter())
    }

    /// Find the placement of a player.
    #[must_use]
    pub fn position_of(&self, player: &PlayerId) -> Option<&Position> {
        self.entries()
            .find(|placed| placed.player() == player)
            .map(|placed| &placed.position)
    }

    #[must_use]
    pub fn player_count(&self) -> usize {
        self.ranking.len()
    }
}

/// Cut the ranking into groups of `subgroup_size`, labelled in ranking order.
///
/// The final group may be short. Running out of labels is a configuration
/// error and nothing is partially matched.
///
/// # Errors
///
/// Returns `ConfigError` when the subgroup size is zero or the label list is
/// too short for the number of groups needed.
pub fn ladder_match(
    ranked: Vec<RankedEntry>,
    cfg: &SettlementConfig,
) -> Result<Matching, ConfigError> {
    if cfg.subgroup_size == 0 {
        return Err(ConfigError::NonPositiveSubgroupSize(cfg.subgroup_size));
    }
    cfg.check_capacity(ranked.len())?;

    let mut matching = Matching {
        ranking: Vec::with_capacity(ranked.len()),
        groups: Vec::with_capacity(cfg.groups_needed(ranked.len())),
        bars: Vec::with_capacity(cfg.groups_needed(ranked.len())),
    };

    for (idx, entry) in ranked.into_iter().enumerate() {
        if idx % cfg.subgroup_size == 0 {
            let label = cfg.group_labels[matching.groups.len()].clone();
            matching.groups.push(Group {
                label,
                members: Vec::with_capacity(cfg.subgroup_size),
            });
            matching.bars.push(GroupBars::new());
        }
        let group_idx = matching.groups.len() - 1;
        let group = &mut matching.groups[group_idx];
        let position = Position {
            group: group_idx,
            label: group.label.clone(),
            slot: group.members.len(),
        };
        matching.ranking.push(entry.submission.player.clone());
        matching.bars[group_idx].push((entry.submission.contribution, entry.submission.demand));
        group.members.push(PlacedEntry { entry, position });
    }

    Ok(matching)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::Submission;

    fn ranked(values: &[f64]) -> Vec<RankedEntry> {
        values
            .iter()
            .enumerate()
            .map(|(rank, &value)| RankedEntry {
                submission: Submission::new(format!("p{rank}"), value),
                rank,
                ranking_value: value,
            })
            .collect()
    }

    fn cfg(size: usize, labels: &[&str]) -> SettlementConfig {
        SettlementConfig {
            subgroup_size: size,
            group_labels: labels.iter().map(ToString::to_string).collect(),
            ..SettlementConfig::default()
        }
    }

    #[test]
    fn splits_into_labelled_blocks_with_short_tail() {
        let matching = ladder_match(
            ranked(&[9.0, 8.0, 7.0, 6.0, 5.0]),
            &cfg(2, &["A", "B", "C"]),
        )
        .unwrap();
        let sizes: Vec<usize> = matching.groups.iter().map(Group::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        let labels: Vec<&str> = matching.groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "B", "C"]);
        let tail = &matching.groups[2].members[0];
        assert_eq!(tail.position.indices(), [2, 0]);
        assert_eq!(tail.position.label, "C");
    }

    #[test]
    fn bars_mirror_member_order() {
        let mut entries = ranked(&[4.0, 3.0]);
        entries[1].submission.demand = Some(6.0);
        let matching = ladder_match(entries, &cfg(4, &["A"])).unwrap();
        assert_eq!(matching.bars.len(), 1);
        assert_eq!(matching.bars[0].as_slice(), &[(4.0, None), (3.0, Some(6.0))]);
        assert!((matching.groups[0].account_total() - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn concatenated_groups_reproduce_ranking() {
        let matching =
            ladder_match(ranked(&[5.0, 4.0, 3.0, 2.0, 1.0, 0.0, -1.0]), &cfg(3, &["X", "Y", "Z"]))
                .unwrap();
        let flattened: Vec<PlayerId> = matching.entries().map(|p| p.player().clone()).collect();
        assert_eq!(flattened, matching.ranking);
        assert_eq!(
            matching.position_of(&PlayerId::from("p4")).map(Position::indices),
            Some([1, 1])
        );
    }

    #[test]
    fn exhausted_labels_are_fatal() {
        let err = ladder_match(ranked(&[3.0, 2.0, 1.0]), &cfg(1, &["A", "B"])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::LabelsExhausted {
                needed: 3,
                available: 2
            }
        );
    }

    #[test]
    fn zero_subgroup_size_is_fatal() {
        let err = ladder_match(ranked(&[1.0]), &cfg(0, &["A"])).unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveSubgroupSize(0));
    }

    #[test]
    fn empty_ranking_yields_empty_matching() {
        let matching = ladder_match(Vec::new(), &cfg(2, &[])).unwrap();
        assert_eq!(matching, Matching::default());
    }
}
