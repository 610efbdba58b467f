//! Contribution ranking with random tie-breaks and the noisy-ranking hook.
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::config::NoiseParams;
use crate::submission::Submission;

/// A submission placed in the round's total order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub submission: Submission,
    /// Zero-based position in the total order.
    pub rank: usize,
    /// Value the order was computed from (raw or noise-perturbed contribution).
    pub ranking_value: f64,
}

/// Perturbs contributions before the noisy ranking is computed.
pub trait NoiseStrategy {
    /// Return the value the noisy ranking sorts this submission by.
    fn noisy_contribution(
        &self,
        submission: &Submission,
        params: &NoiseParams,
        rng: &mut dyn RngCore,
    ) -> f64;

    /// True when the strategy never changes a contribution, letting the
    /// settler reuse the raw ranking instead of drawing a second one.
    fn is_identity(&self) -> bool {
        false
    }
}

/// Default strategy: the noisy ranking equals the raw ranking.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityNoise;

impl NoiseStrategy for IdentityNoise {
    fn noisy_contribution(
        &self,
        submission: &Submission,
        _params: &NoiseParams,
        _rng: &mut dyn RngCore,
    ) -> f64 {
        submission.contribution
    }

    fn is_identity(&self) -> bool {
        true
    }
}

impl<F> NoiseStrategy for F
where
    F: Fn(&Submission, &NoiseParams, &mut dyn RngCore) -> f64,
{
    fn noisy_contribution(
        &self,
        submission: &Submission,
        params: &NoiseParams,
        rng: &mut dyn RngCore,
    ) -> f64 {
        self(submission, params, rng)
    }
}

/// Order submissions by contribution, highest first.
///
/// Every entry draws one tie-break key per call, so equal contributions land
/// in a uniformly random but transitive order.
pub fn rank<R: RngCore + ?Sized>(submissions: &[Submission], tie_rng: &mut R) -> Vec<RankedEntry> {
    let valued = submissions
        .iter()
        .map(|submission| (submission.clone(), submission.contribution))
        .collect();
    rank_by_value(valued, tie_rng)
}

/// Order submissions by a noise-perturbed contribution, highest first.
///
/// A non-finite value from the strategy falls back to the raw contribution.
pub fn rank_noisy<N, R>(
    submissions: &[Submission],
    noise: &N,
    params: &NoiseParams,
    noise_rng: &mut dyn RngCore,
    tie_rng: &mut R,
) -> Vec<RankedEntry>
where
    N: NoiseStrategy + ?Sized,
    R: RngCore + ?Sized,
{
    let valued = submissions
        .iter()
        .map(|submission| {
            let value = noise.noisy_contribution(submission, params, noise_rng);
            if value.is_finite() {
                (submission.clone(), value)
            } else {
                log::warn!(
                    "noise strategy produced {value} for player {}; using raw contribution",
                    submission.player
                );
                (submission.clone(), submission.contribution)
            }
        })
        .collect();
    rank_by_value(valued, tie_rng)
}

fn rank_by_value<R: RngCore + ?Sized>(
    valued: Vec<(Submission, f64)>,
    tie_rng: &mut R,
) -> Vec<RankedEntry> {
    let mut keyed: Vec<(Submission, f64, u64)> = valued
        .into_iter()
        .map(|(submission, value)| (submission, value, tie_rng.next_u64()))
        .collect();

    keyed.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.2.cmp(&b.2))
    });

    keyed
        .into_iter()
        .enumerate()
        .map(|(rank, (submission, ranking_value, _))| RankedEntry {
            submission,
            rank,
            ranking_value,
        })
        .collect()
}
