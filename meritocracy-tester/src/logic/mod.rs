pub mod checks;
pub mod reports;
pub mod scenarios;
pub mod seeds;
pub mod simulation;
pub mod tester;

pub use scenarios::{expand_scenarios, find_scenario, list_scenarios};
pub use seeds::{SeedInfo, resolve_seed_inputs};
pub use simulation::{Simulator, settle_once};
pub use tester::*;
