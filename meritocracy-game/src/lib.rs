//! Meritocracy Round Settlement
//!
//! Platform-agnostic settlement logic for the meritocracy contribution game:
//! deduplicating a round's submissions, ranking players, ladder-matching them
//! into groups, computing group statistics and public-goods payoffs, and
//! handing the results to the host's persistence, registry and delivery layers.

pub mod config;
pub mod constants;
pub mod emitter;
pub mod error;
pub mod matching;
pub mod numbers;
pub mod payoff;
pub mod ranking;
pub mod rng;
pub mod settlement;
pub mod stats;
pub mod submission;

// Re-export commonly used types
pub use config::{NoiseParams, SettlementConfig, load_default_config};
pub use emitter::{
    CollaboratorFailure, EmitReport, FailureStage, PlayerRoundRecord, ResultEmitter, ResultPayload,
    RoundResults,
};
pub use error::{ConfigError, SettlementError};
pub use matching::{Bar, Group, GroupBars, GroupLabel, Matching, PlacedEntry, Position, ladder_match};
pub use payoff::{PayoffCalculator, PayoffRecord};
pub use ranking::{IdentityNoise, NoiseStrategy, RankedEntry, rank, rank_noisy};
pub use rng::{CountingRng, SettlementRng};
pub use settlement::{RoundOutcome, RoundSettler};
pub use stats::{GroupStats, GroupStatsTable, StatValue, compute_group_stats, group_stats};
pub use submission::{PlayerId, RoundId, Submission, deduplicate};

use serde::Serialize;

/// Trait for abstracting retrieval of a round's raw submissions
/// Host-specific implementations should provide this
pub trait SubmissionSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// All submissions recorded for `round`, in arrival order, duplicates included
    ///
    /// # Errors
    ///
    /// Returns an error if the submissions cannot be queried.
    fn submissions(&self, round: RoundId) -> Result<Vec<Submission>, Self::Error>;
}

/// Trait for abstracting persistence of round results
pub trait RoundStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Save the group-level results of a round
    ///
    /// # Errors
    ///
    /// Returns an error if the results cannot be saved.
    fn save_round_results(&self, results: &RoundResults<'_>) -> Result<(), Self::Error>;

    /// Save one player's values for a round
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be saved.
    fn save_player_values(&self, record: &PlayerRoundRecord<'_>) -> Result<(), Self::Error>;
}

/// Trait for abstracting delivery of results to a player's client
pub trait ResultDelivery {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send the payload to the player's client
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be delivered.
    fn deliver(&self, player: &PlayerId, payload: &ResultPayload<'_>) -> Result<(), Self::Error>;
}

/// Trait for abstracting the registry that owns running player balances
pub trait BalanceRegistry {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Add `amount` to the player's running balance as a single request
    ///
    /// # Errors
    ///
    /// Returns an error if the player cannot be resolved; the player is then
    /// skipped for the rest of the round.
    fn add_to_balance(&self, player: &PlayerId, amount: f64) -> Result<(), Self::Error>;
}

/// Outcome of settling and emitting one round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementReport {
    pub round: RoundId,
    pub outcome: RoundOutcome,
    pub emit: EmitReport,
}

/// Main settlement engine binding the pure settler to its collaborators
pub struct SettlementEngine<Src, St, D, R>
where
    Src: SubmissionSource,
    St: RoundStore,
    D: ResultDelivery,
    R: BalanceRegistry,
{
    settler: RoundSettler,
    source: Src,
    store: St,
    delivery: D,
    registry: R,
}

impl<Src, St, D, R> SettlementEngine<Src, St, D, R>
where
    Src: SubmissionSource,
    St: RoundStore,
    D: ResultDelivery,
    R: BalanceRegistry,
{
    /// Create a new engine from a configured settler and the host collaborators
    pub const fn new(settler: RoundSettler, source: Src, store: St, delivery: D, registry: R) -> Self {
        Self {
            settler,
            source,
            store,
            delivery,
            registry,
        }
    }

    /// Fetch, settle and emit one round
    ///
    /// # Errors
    ///
    /// Returns an error if the submissions cannot be fetched or the round
    /// cannot be settled. Per-player collaborator failures are reported on
    /// the returned `SettlementReport` instead.
    pub fn settle_round(
        &mut self,
        round: RoundId,
        compatibility: Option<bool>,
    ) -> Result<SettlementReport, SettlementError> {
        let raw = self
            .source
            .submissions(round)
            .map_err(|err| SettlementError::Source(Box::new(err)))?;
        let outcome = self.settler.settle(raw)?;
        let emit = ResultEmitter::new(
            &self.store,
            &self.delivery,
            &self.registry,
            self.settler.config().persistence_enabled,
        )
        .emit(round, &outcome, compatibility);

        log::info!(
            target: constants::LOG_TARGET_EMIT,
            "round {round}: {} delivered, {} skipped, {} failures",
            emit.delivered.len(),
            emit.skipped.len(),
            emit.failures.len()
        );

        Ok(SettlementReport {
            round,
            outcome,
            emit,
        })
    }

    /// Borrow the settler
    #[must_use]
    pub const fn settler(&self) -> &RoundSettler {
        &self.settler
    }

    /// Borrow the settler mutably, e.g. to reseed it
    pub const fn settler_mut(&mut self) -> &mut RoundSettler {
        &mut self.settler
    }

    #[must_use]
    pub const fn source(&self) -> &Src {
        &self.source
    }

    #[must_use]
    pub const fn store(&self) -> &St {
        &self.store
    }

    #[must_use]
    pub const fn delivery(&self) -> &D {
        &self.delivery
    }

    #[must_use]
    pub const fn registry(&self) -> &R {
        &self.registry
    }
}
