//! The pure settlement pipeline: dedup, rank, match, aggregate, pay.
use serde::{Deserialize, Serialize};

use crate::config::SettlementConfig;
use crate::constants::LOG_TARGET_SETTLEMENT;
use crate::error::SettlementError;
use crate::matching::{Matching, ladder_match};
use crate::payoff::{PayoffCalculator, PayoffRecord};
use crate::ranking::{IdentityNoise, NoiseStrategy, rank, rank_noisy};
use crate::rng::SettlementRng;
use crate::stats::{GroupStatsTable, compute_group_stats};
use crate::submission::{PlayerId, Submission, deduplicate};

/// Everything computed for one round.
///
/// The noisy path is the one players are paid and informed on; it equals the
/// raw path unless a non-identity noise strategy is installed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub matching: Matching,
    pub group_stats: GroupStatsTable,
    pub noisy_matching: Matching,
    pub noisy_group_stats: GroupStatsTable,
    pub payoffs: Vec<PayoffRecord>,
}

impl RoundOutcome {
    /// Player ids from top to bottom, without noise.
    #[must_use]
    pub fn ranking(&self) -> &[PlayerId] {
        &self.matching.ranking
    }

    /// Player ids from top to bottom, as matched for payment.
    #[must_use]
    pub fn noisy_ranking(&self) -> &[PlayerId] {
        &self.noisy_matching.ranking
    }

    #[must_use]
    pub fn payoff_of(&self, player: &PlayerId) -> Option<&PayoffRecord> {
        self.payoffs.iter().find(|record| &record.player == player)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matching.ranking.is_empty()
    }
}

/// Settles rounds under one configuration, noise strategy and random stream.
pub struct RoundSettler {
    cfg: SettlementConfig,
    noise: Box<dyn NoiseStrategy>,
    rng: SettlementRng,
}

impl std::fmt::Debug for RoundSettler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundSettler")
            .field("cfg", &self.cfg)
            .field("noise_identity", &self.noise.is_identity())
            .field("rng", &self.rng)
            .finish()
    }
}

impl RoundSettler {
    /// Create a settler with identity noise and the given seed.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(cfg: SettlementConfig, seed: u64) -> Result<Self, SettlementError> {
        Self::with_noise(cfg, Box::new(IdentityNoise), SettlementRng::from_user_seed(seed))
    }

    /// Create a settler with an explicit noise strategy and random streams.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_noise(
        cfg: SettlementConfig,
        noise: Box<dyn NoiseStrategy>,
        rng: SettlementRng,
    ) -> Result<Self, SettlementError> {
        cfg.validate()?;
        Ok(Self { cfg, noise, rng })
    }

    #[must_use]
    pub const fn config(&self) -> &SettlementConfig {
        &self.cfg
    }

    #[must_use]
    pub const fn rng(&self) -> &SettlementRng {
        &self.rng
    }

    /// Deterministically reseed the random streams.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = SettlementRng::from_user_seed(seed);
    }

    /// Settle one round from its raw submissions in arrival order.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the labels cannot name every group,
    /// and a data-consistency error for non-finite submissions or a matching
    /// whose positions do not address its bars. Nothing is returned partially.
    pub fn settle(&mut self, raw: Vec<Submission>) -> Result<RoundOutcome, SettlementError> {
        let raw_count = raw.len();
        let submissions = deduplicate(raw);
        for submission in &submissions {
            submission.validate()?;
        }
        self.cfg.check_capacity(submissions.len())?;

        if submissions.len() < raw_count {
            log::debug!(
                target: LOG_TARGET_SETTLEMENT,
                "dropped {} duplicate submissions",
                raw_count - submissions.len()
            );
        }

        let ranked = rank(&submissions, self.rng.tie_break());
        let matching = ladder_match(ranked, &self.cfg)?;
        let group_stats = compute_group_stats(&matching.groups, self.cfg.demand_tracked);

        let (noisy_matching, noisy_group_stats) = if self.noise.is_identity() {
            (matching.clone(), group_stats.clone())
        } else {
            let (tie_rng, noise_rng) = self.rng.split();
            let noisy_ranked = rank_noisy(
                &submissions,
                self.noise.as_ref(),
                &self.cfg.noise,
                noise_rng,
                tie_rng,
            );
            let noisy_matching = ladder_match(noisy_ranked, &self.cfg)?;
            let noisy_stats = compute_group_stats(&noisy_matching.groups, self.cfg.demand_tracked);
            (noisy_matching, noisy_stats)
        };

        let payoffs = PayoffCalculator::from_config(&self.cfg).payoffs(&noisy_matching)?;

        log::info!(
            target: LOG_TARGET_SETTLEMENT,
            "settled {} players into {} groups",
            matching.player_count(),
            matching.groups.len()
        );

        Ok(RoundOutcome {
            matching,
            group_stats,
            noisy_matching,
            noisy_group_stats,
            payoffs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NoiseParams;
    use crate::error::ConfigError;
    use crate::stats::StatValue;
    use rand::RngCore;

    fn example_cfg() -> SettlementConfig {
        SettlementConfig {
            subgroup_size: 2,
            group_labels: vec!["A".into(), "B".into()],
            initial_coins: 10.0,
            group_account_divider: 2.0,
            ..SettlementConfig::default()
        }
    }

    fn example_round() -> Vec<Submission> {
        vec![
            Submission::new("A", 6.0),
            Submission::new("B", 4.0),
            Submission::new("C", 10.0),
            Submission::new("D", 2.0),
        ]
    }

    fn ids(ids: &[&str]) -> Vec<PlayerId> {
        ids.iter().map(|id| PlayerId::from(*id)).collect()
    }

    #[test]
    fn worked_example_settles() {
        let mut settler = RoundSettler::new(example_cfg(), 42).unwrap();
        let outcome = settler.settle(example_round()).unwrap();

        assert_eq!(outcome.ranking(), ids(&["C", "A", "B", "D"]).as_slice());
        assert_eq!(outcome.noisy_ranking(), outcome.ranking());

        let payoffs: Vec<(String, f64)> = outcome
            .payoffs
            .iter()
            .map(|r| (r.player.to_string(), r.payoff))
            .collect();
        assert_eq!(
            payoffs,
            vec![
                ("C".to_string(), 8.0),
                ("A".to_string(), 12.0),
                ("B".to_string(), 9.0),
                ("D".to_string(), 11.0),
            ]
        );

        let stats_a = outcome.group_stats["A"];
        assert!((stats_a.avg_contribution - 8.0).abs() < f64::EPSILON);
        assert_eq!(stats_a.std_contribution, StatValue::NotAvailable);
        assert!((outcome.payoffs[0].group_account_total - 16.0).abs() < f64::EPSILON);
        assert!((outcome.payoffs[2].group_account_total - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_round_is_not_an_error() {
        let mut settler = RoundSettler::new(example_cfg(), 1).unwrap();
        let outcome = settler.settle(Vec::new()).unwrap();
        assert!(outcome.is_empty());
        assert!(outcome.matching.groups.is_empty());
        assert!(outcome.group_stats.is_empty());
        assert!(outcome.payoffs.is_empty());
    }

    #[test]
    fn too_many_players_for_labels_is_fatal() {
        let mut settler = RoundSettler::new(example_cfg(), 1).unwrap();
        let mut round = example_round();
        round.push(Submission::new("E", 1.0));
        let err = settler.settle(round).unwrap_err();
        assert!(matches!(
            err,
            SettlementError::Config(ConfigError::LabelsExhausted {
                needed: 3,
                available: 2
            })
        ));
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let cfg = SettlementConfig {
            group_account_divider: -1.0,
            ..example_cfg()
        };
        assert!(matches!(
            RoundSettler::new(cfg, 1),
            Err(SettlementError::Config(ConfigError::NonPositiveDivider(_)))
        ));
    }

    #[test]
    fn duplicate_submissions_settle_on_latest() {
        let mut settler = RoundSettler::new(example_cfg(), 5).unwrap();
        let mut round = example_round();
        round.push(Submission::new("D", 20.0));
        let outcome = settler.settle(round).unwrap();
        assert_eq!(outcome.ranking()[0], PlayerId::from("D"));
        assert_eq!(outcome.ranking().len(), 4);
    }

    #[test]
    fn non_finite_contribution_is_a_consistency_error() {
        let mut settler = RoundSettler::new(example_cfg(), 5).unwrap();
        let err = settler
            .settle(vec![Submission::new("A", f64::INFINITY)])
            .unwrap_err();
        assert!(err.is_data_consistency());
    }

    #[test]
    fn noisy_path_drives_payoffs() {
        let invert = |s: &Submission, _: &NoiseParams, _: &mut dyn RngCore| -s.contribution;
        let mut settler = RoundSettler::with_noise(
            example_cfg(),
            Box::new(invert),
            SettlementRng::from_user_seed(3),
        )
        .unwrap();
        let outcome = settler.settle(example_round()).unwrap();

        assert_eq!(outcome.ranking(), ids(&["C", "A", "B", "D"]).as_slice());
        assert_eq!(outcome.noisy_ranking(), ids(&["D", "B", "A", "C"]).as_slice());
        // D and B share group "A" of the noisy matching: total 6.
        let d = outcome.payoff_of(&PlayerId::from("D")).unwrap();
        assert!((d.payoff - 11.0).abs() < f64::EPSILON);
        assert_eq!(d.position.label, "A");
    }

    #[test]
    fn same_seed_same_outcome() {
        let round: Vec<Submission> = (0..12).map(|i| Submission::new(format!("p{i}"), 5.0)).collect();
        let cfg = SettlementConfig::default();
        let a = RoundSettler::new(cfg.clone(), 77).unwrap().settle(round.clone()).unwrap();
        let b = RoundSettler::new(cfg, 77).unwrap().settle(round).unwrap();
        assert_eq!(a, b);
    }
}
