//! Centralized defaults for round settlement.
//!
//! These values define the default game variant. Hosts override them through
//! `SettlementConfig`, usually loaded from the JSON asset shipped with the
//! crate.

// Matching ----------------------------------------------------------------
pub(crate) const DEFAULT_SUBGROUP_SIZE: usize = 4;
pub(crate) const DEFAULT_GROUP_LABELS: [&str; 16] = [
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P",
];

// Payoff ------------------------------------------------------------------
pub(crate) const DEFAULT_INITIAL_COINS: f64 = 10.0;
pub(crate) const DEFAULT_GROUP_ACCOUNT_DIVIDER: f64 = 2.0;

// Noise (variance; "high" and "low" refer to meritocracy, not noise) -------
pub(crate) const DEFAULT_NOISE_HIGH: f64 = 0.5;
pub(crate) const DEFAULT_NOISE_LOW: f64 = 2.0;

// Statistics --------------------------------------------------------------
/// Degrees of freedom at or below which a standard deviation is reported as NA.
pub(crate) const MIN_STD_DEGREES_OF_FREEDOM: usize = 1;
pub(crate) const NOT_AVAILABLE: &str = "NA";

// RNG stream domain tags --------------------------------------------------
pub(crate) const RNG_TAG_TIE_BREAK: &[u8] = b"tie-break";
pub(crate) const RNG_TAG_NOISE: &[u8] = b"noise";

// Logging targets ---------------------------------------------------------
pub(crate) const LOG_TARGET_SETTLEMENT: &str = "meritocracy::settlement";
pub(crate) const LOG_TARGET_EMIT: &str = "meritocracy::emit";
