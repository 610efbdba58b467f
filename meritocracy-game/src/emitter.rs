//! Hands a settled round to the persistence, registry and delivery collaborators.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::LOG_TARGET_EMIT;
use crate::matching::{GroupBars, Position};
use crate::settlement::RoundOutcome;
use crate::stats::GroupStatsTable;
use crate::submission::{PlayerId, RoundId, Submission};
use crate::{BalanceRegistry, ResultDelivery, RoundStore};

/// What each client receives: all bars, its own `[group, slot]`, its payoff.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultPayload<'a> {
    pub bars: &'a [GroupBars],
    pub position: [usize; 2],
    pub payoff: f64,
    pub compatibility: Option<bool>,
}

/// Group-level record persisted once per round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundResults<'a> {
    pub round: RoundId,
    pub ranking: &'a [PlayerId],
    pub group_stats: &'a GroupStatsTable,
    pub noisy_ranking: &'a [PlayerId],
    pub noisy_group_stats: &'a GroupStatsTable,
}

/// Player-level record persisted for every resolved player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerRoundRecord<'a> {
    pub round: RoundId,
    pub submission: &'a Submission,
    pub payoff: f64,
    pub position: &'a Position,
    pub ranking: &'a [PlayerId],
    pub noisy_ranking: &'a [PlayerId],
    pub group_stats: &'a GroupStatsTable,
}

/// Collaborator step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    RoundPersistence,
    Lookup,
    PlayerPersistence,
    Delivery,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoundPersistence => write!(f, "round persistence"),
            Self::Lookup => write!(f, "lookup"),
            Self::PlayerPersistence => write!(f, "player persistence"),
            Self::Delivery => write!(f, "delivery"),
        }
    }
}

/// A recoverable collaborator failure recorded during emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorFailure {
    pub stage: FailureStage,
    pub player: Option<PlayerId>,
    pub message: String,
}

/// Per-player results of emitting one round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitReport {
    /// Players whose balance was credited and whose payload was delivered.
    pub delivered: Vec<PlayerId>,
    /// Players skipped after a failed registry lookup.
    pub skipped: Vec<PlayerId>,
    pub failures: Vec<CollaboratorFailure>,
}

impl EmitReport {
    fn record(&mut self, stage: FailureStage, player: Option<&PlayerId>, message: String) {
        match player {
            Some(player) => log::warn!(
                target: LOG_TARGET_EMIT,
                "{stage} failed for player {player}: {message}"
            ),
            None => log::warn!(target: LOG_TARGET_EMIT, "{stage} failed: {message}"),
        }
        self.failures.push(CollaboratorFailure {
            stage,
            player: player.cloned(),
            message,
        });
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.failures.is_empty()
    }
}

/// Sends a settled round to the external collaborators, player by player.
#[derive(Debug)]
pub struct ResultEmitter<'a, St, D, R> {
    store: &'a St,
    delivery: &'a D,
    registry: &'a R,
    persistence_enabled: bool,
}

impl<'a, St, D, R> ResultEmitter<'a, St, D, R>
where
    St: RoundStore,
    D: ResultDelivery,
    R: BalanceRegistry,
{
    #[must_use]
    pub const fn new(store: &'a St, delivery: &'a D, registry: &'a R, persistence_enabled: bool) -> Self {
        Self {
            store,
            delivery,
            registry,
            persistence_enabled,
        }
    }

    /// Persist the round, credit every player and deliver their payloads.
    ///
    /// A player whose registry lookup fails is skipped entirely; persistence
    /// and delivery failures are recorded and the remaining players proceed.
    pub fn emit(
        &self,
        round: RoundId,
        outcome: &RoundOutcome,
        compatibility: Option<bool>,
    ) -> EmitReport {
        let mut report = EmitReport::default();

        if self.persistence_enabled {
            let results = RoundResults {
                round,
                ranking: outcome.ranking(),
                group_stats: &outcome.group_stats,
                noisy_ranking: outcome.noisy_ranking(),
                noisy_group_stats: &outcome.noisy_group_stats,
            };
            if let Err(err) = self.store.save_round_results(&results) {
                report.record(FailureStage::RoundPersistence, None, err.to_string());
            }
        }

        let bars = outcome.noisy_matching.bars.as_slice();
        for (placed, record) in outcome.noisy_matching.entries().zip(&outcome.payoffs) {
            let player = &record.player;
            debug_assert_eq!(placed.player(), player);

            if let Err(err) = self.registry.add_to_balance(player, record.payoff) {
                report.record(FailureStage::Lookup, Some(player), err.to_string());
                report.skipped.push(player.clone());
                continue;
            }
            log::debug!(target: LOG_TARGET_EMIT, "added {} to {player}", record.payoff);

            if self.persistence_enabled {
                let values = PlayerRoundRecord {
                    round,
                    submission: &placed.entry.submission,
                    payoff: record.payoff,
                    position: &record.position,
                    ranking: outcome.ranking(),
                    noisy_ranking: outcome.noisy_ranking(),
                    group_stats: &outcome.group_stats,
                };
                if let Err(err) = self.store.save_player_values(&values) {
                    report.record(FailureStage::PlayerPersistence, Some(player), err.to_string());
                }
            }

            let payload = ResultPayload {
                bars,
                position: record.position.indices(),
                payoff: record.payoff,
                compatibility,
            };
            match self.delivery.deliver(player, &payload) {
                Ok(()) => report.delivered.push(player.clone()),
                Err(err) => report.record(FailureStage::Delivery, Some(player), err.to_string()),
            }
        }

        report
    }
}
