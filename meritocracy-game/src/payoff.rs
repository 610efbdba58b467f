//! Linear public-goods payoffs.
use serde::{Deserialize, Serialize};

use crate::config::SettlementConfig;
use crate::error::SettlementError;
use crate::matching::{GroupBars, Matching, Position};
use crate::submission::PlayerId;

/// Per-player outcome of a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoffRecord {
    pub player: PlayerId,
    pub payoff: f64,
    pub position: Position,
    pub group_account_total: f64,
}

/// Payoff constants of a game variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayoffCalculator {
    initial_coins: f64,
    group_account_divider: f64,
}

impl PayoffCalculator {
    #[must_use]
    pub const fn new(initial_coins: f64, group_account_divider: f64) -> Self {
        Self {
            initial_coins,
            group_account_divider,
        }
    }

    #[must_use]
    pub const fn from_config(cfg: &SettlementConfig) -> Self {
        Self::new(cfg.initial_coins, cfg.group_account_divider)
    }

    /// Sum of contributions in the group at `group`.
    ///
    /// # Errors
    ///
    /// Returns `SettlementError::PositionOutOfRange` if the group does not exist.
    pub fn group_account_total(
        bars: &[GroupBars],
        group: usize,
    ) -> Result<f64, SettlementError> {
        bars.get(group)
            .map(|members| members.iter().map(|(contribution, _)| contribution).sum::<f64>())
            .ok_or(SettlementError::PositionOutOfRange { group, slot: 0 })
    }

    /// `initial - own contribution + group total / divider` for the player at `position`.
    ///
    /// Returns the payoff and the group account total.
    ///
    /// # Errors
    ///
    /// Returns `SettlementError::PositionOutOfRange` if the position does not
    /// address an existing bar.
    pub fn payoff_at(
        &self,
        bars: &[GroupBars],
        position: [usize; 2],
    ) -> Result<(f64, f64), SettlementError> {
        let [group, slot] = position;
        let members = bars
            .get(group)
            .ok_or(SettlementError::PositionOutOfRange { group, slot })?;
        let (own, _) = members
            .get(slot)
            .ok_or(SettlementError::PositionOutOfRange { group, slot })?;
        let total = Self::group_account_total(bars, group)?;
        Ok((
            self.initial_coins - own + total / self.group_account_divider,
            total,
        ))
    }

    /// Compute a payoff record for every player of a matching, in ranking order.
    ///
    /// # Errors
    ///
    /// Returns a data-consistency error when a placement does not match the
    /// bars it is supposed to address.
    pub fn payoffs(&self, matching: &Matching) -> Result<Vec<PayoffRecord>, SettlementError> {
        matching
            .entries()
            .map(|placed| {
                let [group, slot] = placed.position.indices();
                let (payoff, group_account_total) =
                    self.payoff_at(&matching.bars, placed.position.indices())?;
                let (bar_contribution, _) = matching.bars[group][slot];
                if bar_contribution.to_bits() != placed.contribution().to_bits() {
                    return Err(SettlementError::BarsMismatch {
                        player: placed.player().clone(),
                        group,
                        slot,
                    });
                }
                Ok(PayoffRecord {
                    player: placed.player().clone(),
                    payoff,
                    position: placed.position.clone(),
                    group_account_total,
                })
            })
            .collect()
    }
}
