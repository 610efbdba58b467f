use anyhow::{Context, Result};
use meritocracy_game::{
    BalanceRegistry, PlayerId, PlayerRoundRecord, ResultDelivery, ResultPayload, RoundId,
    RoundResults, RoundSettler, RoundStore, SettlementConfig, SettlementEngine, SettlementReport,
    Submission, SubmissionSource,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Errors raised by the in-memory host collaborators.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("no submissions staged for round {0}")]
    MissingRound(RoundId),
    #[error("client for {0} is offline")]
    Offline(PlayerId),
    #[error("code not found: {0}")]
    UnknownPlayer(PlayerId),
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Submission storage keyed by round.
#[derive(Debug, Default)]
pub struct MemorySource {
    rounds: RefCell<HashMap<RoundId, Vec<Submission>>>,
}

impl MemorySource {
    pub fn stage(&self, round: RoundId, submissions: Vec<Submission>) {
        self.rounds.borrow_mut().insert(round, submissions);
    }
}

impl SubmissionSource for MemorySource {
    type Error = HarnessError;

    fn submissions(&self, round: RoundId) -> Result<Vec<Submission>, Self::Error> {
        self.rounds
            .borrow()
            .get(&round)
            .cloned()
            .ok_or(HarnessError::MissingRound(round))
    }
}

/// Keeps every persisted record as JSON, the way a document store would.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rounds: RefCell<Vec<serde_json::Value>>,
    players: RefCell<Vec<serde_json::Value>>,
}

impl MemoryStore {
    pub fn round_count(&self) -> usize {
        self.rounds.borrow().len()
    }

    pub fn player_count(&self) -> usize {
        self.players.borrow().len()
    }
}

impl RoundStore for MemoryStore {
    type Error = HarnessError;

    fn save_round_results(&self, results: &RoundResults<'_>) -> Result<(), Self::Error> {
        let value = serde_json::to_value(results)?;
        self.rounds.borrow_mut().push(value);
        Ok(())
    }

    fn save_player_values(&self, record: &PlayerRoundRecord<'_>) -> Result<(), Self::Error> {
        let value = serde_json::to_value(record)?;
        self.players.borrow_mut().push(value);
        Ok(())
    }
}

/// One payload that reached a client.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivered {
    pub round: u32,
    pub player: PlayerId,
    pub position: [usize; 2],
    pub payoff: f64,
    pub group_count: usize,
}

/// Client connections; players listed as offline drop their payloads.
#[derive(Debug, Default)]
pub struct Outbox {
    offline: HashSet<PlayerId>,
    current_round: RefCell<u32>,
    sent: RefCell<Vec<Delivered>>,
}

impl Outbox {
    #[must_use]
    pub fn new(offline: HashSet<PlayerId>) -> Self {
        Self {
            offline,
            ..Self::default()
        }
    }

    fn begin_round(&self, round: u32) {
        *self.current_round.borrow_mut() = round;
    }
}

impl ResultDelivery for Outbox {
    type Error = HarnessError;

    fn deliver(&self, player: &PlayerId, payload: &ResultPayload<'_>) -> Result<(), Self::Error> {
        if self.offline.contains(player) {
            return Err(HarnessError::Offline(player.clone()));
        }
        self.sent.borrow_mut().push(Delivered {
            round: *self.current_round.borrow(),
            player: player.clone(),
            position: payload.position,
            payoff: payload.payoff,
            group_count: payload.bars.len(),
        });
        Ok(())
    }
}

/// Running balances; players listed as unknown fail the lookup.
#[derive(Debug, Default)]
pub struct Ledger {
    unknown: HashSet<PlayerId>,
    balances: RefCell<HashMap<PlayerId, f64>>,
}

impl Ledger {
    #[must_use]
    pub fn new(unknown: HashSet<PlayerId>) -> Self {
        Self {
            unknown,
            ..Self::default()
        }
    }
}

impl BalanceRegistry for Ledger {
    type Error = HarnessError;

    fn add_to_balance(&self, player: &PlayerId, amount: f64) -> Result<(), Self::Error> {
        if self.unknown.contains(player) {
            return Err(HarnessError::UnknownPlayer(player.clone()));
        }
        *self.balances.borrow_mut().entry(player.clone()).or_default() += amount;
        Ok(())
    }
}

pub type HarnessEngine = SettlementEngine<MemorySource, MemoryStore, Outbox, Ledger>;

/// Assertion hook run after a simulation completes.
type SimulationExpectationFn =
    Arc<dyn Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct SimulationExpectation(SimulationExpectationFn);

impl std::fmt::Debug for SimulationExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationExpectation").finish()
    }
}

impl SimulationExpectation {
    pub fn evaluate(&self, summary: &SimulationSummary) -> Result<()> {
        (self.0)(summary)
    }
}

impl<F> From<F> for SimulationExpectation
where
    F: Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

/// Shape of the rounds a scenario generates.
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub min_players: usize,
    pub max_players: usize,
    pub rounds: u32,
    pub duplicate_rate: f64,
    pub offline_rate: f64,
    pub unknown_rate: f64,
    pub demand_tracked: bool,
    pub tied_contributions: bool,
    pub expectations: Vec<SimulationExpectation>,
}

impl Default for SimulationPlan {
    fn default() -> Self {
        Self {
            min_players: 4,
            max_players: 16,
            rounds: 3,
            duplicate_rate: 0.0,
            offline_rate: 0.0,
            unknown_rate: 0.0,
            demand_tracked: false,
            tied_contributions: false,
            expectations: Vec::new(),
        }
    }
}

impl SimulationPlan {
    #[must_use]
    pub const fn with_players(mut self, min: usize, max: usize) -> Self {
        self.min_players = min;
        self.max_players = max;
        self
    }

    #[must_use]
    pub const fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    #[must_use]
    pub const fn with_duplicates(mut self, rate: f64) -> Self {
        self.duplicate_rate = rate;
        self
    }

    #[must_use]
    pub const fn with_flaky_clients(mut self, offline_rate: f64, unknown_rate: f64) -> Self {
        self.offline_rate = offline_rate;
        self.unknown_rate = unknown_rate;
        self
    }

    #[must_use]
    pub const fn with_demand(mut self) -> Self {
        self.demand_tracked = true;
        self
    }

    #[must_use]
    pub const fn with_ties(mut self) -> Self {
        self.tied_contributions = true;
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: impl Into<SimulationExpectation>) -> Self {
        self.expectations.push(expectation.into());
        self
    }

    fn draw_round(
        &self,
        roster: &[PlayerId],
        cfg: &SettlementConfig,
        rng: &mut ChaCha20Rng,
    ) -> Vec<Submission> {
        let ceiling = cfg.initial_coins.max(0.0);
        let mut stale = Vec::new();
        let mut fresh = Vec::with_capacity(roster.len());

        for player in roster {
            let contribution = if self.tied_contributions {
                (ceiling / 2.0).round()
            } else {
                rng.gen_range(0.0..=ceiling).round()
            };
            let mut submission = Submission::new(player.clone(), contribution);
            if self.demand_tracked {
                submission = submission.with_demand(rng.gen_range(0.0..=ceiling).round());
            }
            if rng.gen_bool(self.duplicate_rate) {
                // Resent by a reconnecting client before the final value.
                stale.push(Submission::new(player.clone(), rng.gen_range(0.0..=ceiling).round()));
            }
            fresh.push(submission);
        }

        stale.extend(fresh);
        stale
    }
}

/// One settled round with the submissions that produced it.
#[derive(Debug, Clone)]
pub struct RoundSummary {
    pub raw: Vec<Submission>,
    pub report: SettlementReport,
}

/// Complete record of a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub seed: u64,
    pub config: SettlementConfig,
    pub rounds: Vec<RoundSummary>,
    pub offline: HashSet<PlayerId>,
    pub unknown: HashSet<PlayerId>,
    pub balances: HashMap<PlayerId, f64>,
    pub deliveries: Vec<Delivered>,
    pub persisted_rounds: usize,
    pub persisted_players: usize,
}

/// Drives seeded rounds through a settlement engine wired to in-memory hosts.
#[derive(Debug, Clone)]
pub struct Simulator {
    config: SettlementConfig,
    verbose: bool,
}

impl Simulator {
    #[must_use]
    pub const fn new(config: SettlementConfig, verbose: bool) -> Self {
        Self { config, verbose }
    }

    pub fn run_plan(&self, plan: &SimulationPlan, seed: u64) -> Result<SimulationSummary> {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut cfg = self.config.clone();
        cfg.demand_tracked |= plan.demand_tracked;

        let max = plan.max_players.max(plan.min_players);
        let players = rng.gen_range(plan.min_players..=max).min(cfg.max_players());
        let roster: Vec<PlayerId> = (0..players)
            .map(|idx| PlayerId::new(format!("p{idx:03}")))
            .collect();
        let offline: HashSet<PlayerId> = roster
            .iter()
            .filter(|_| rng.gen_bool(plan.offline_rate))
            .cloned()
            .collect();
        let unknown: HashSet<PlayerId> = roster
            .iter()
            .filter(|_| rng.gen_bool(plan.unknown_rate))
            .cloned()
            .collect();

        let settler = RoundSettler::new(cfg.clone(), seed)?;
        let mut engine = HarnessEngine::new(
            settler,
            MemorySource::default(),
            MemoryStore::default(),
            Outbox::new(offline.clone()),
            Ledger::new(unknown.clone()),
        );

        let mut rounds = Vec::with_capacity(usize::try_from(plan.rounds).unwrap_or(0));
        for number in 1..=plan.rounds {
            let round = RoundId::new(1, number);
            let raw = plan.draw_round(&roster, &cfg, &mut rng);
            engine.source().stage(round, raw.clone());
            engine.delivery().begin_round(number);

            let report = engine
                .settle_round(round, Some(true))
                .with_context(|| format!("settling round {round} (seed {seed})"))?;
            if self.verbose {
                log::info!(
                    "seed {seed} round {round}: {} players, {} groups, {} failures",
                    report.outcome.ranking().len(),
                    report.outcome.matching.groups.len(),
                    report.emit.failures.len()
                );
            }
            rounds.push(RoundSummary { raw, report });
        }

        Ok(SimulationSummary {
            seed,
            config: cfg,
            rounds,
            offline,
            unknown,
            balances: engine.registry().balances.borrow().clone(),
            deliveries: engine.delivery().sent.borrow().clone(),
            persisted_rounds: engine.store().round_count(),
            persisted_players: engine.store().player_count(),
        })
    }
}

/// Settle a single round of externally supplied submissions.
pub fn settle_once(
    cfg: SettlementConfig,
    submissions: Vec<Submission>,
    seed: u64,
) -> Result<SettlementReport> {
    let round = RoundId::new(1, 1);
    let source = MemorySource::default();
    source.stage(round, submissions);
    let mut engine = HarnessEngine::new(
        RoundSettler::new(cfg, seed)?,
        source,
        MemoryStore::default(),
        Outbox::default(),
        Ledger::default(),
    );
    engine
        .settle_round(round, None)
        .context("settling supplied submissions")
}
