use super::checks;
use super::simulation::SimulationPlan;

/// Named simulation plan selectable from the command line.
#[derive(Debug, Clone)]
pub struct TestScenario {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub plan: SimulationPlan,
}

impl TestScenario {
    const fn new(
        key: &'static str,
        name: &'static str,
        description: &'static str,
        plan: SimulationPlan,
    ) -> Self {
        Self {
            key,
            name,
            description,
            plan,
        }
    }
}

pub fn catalog() -> Vec<TestScenario> {
    vec![
        TestScenario::new(
            "smoke",
            "Smoke",
            "Small rounds through the full pipeline with every check enabled",
            with_all_checks(SimulationPlan::default()),
        ),
        TestScenario::new(
            "ladder",
            "Ladder Matching",
            "Ranking order and contiguous group partition across uneven round sizes",
            SimulationPlan::default()
                .with_players(1, 64)
                .with_rounds(5)
                .with_expectation(checks::ranking_is_ordered_permutation)
                .with_expectation(checks::ladder_partition_holds),
        ),
        TestScenario::new(
            "reconnects",
            "Reconnect Duplicates",
            "Duplicate submissions resolved to each player's last arrival",
            SimulationPlan::default()
                .with_players(4, 24)
                .with_duplicates(0.5)
                .with_expectation(checks::ranking_is_ordered_permutation)
                .with_expectation(checks::payoffs_follow_public_goods_rule),
        ),
        TestScenario::new(
            "payoffs",
            "Public Goods Payoffs",
            "Payoff formula and balance accumulation over many rounds",
            SimulationPlan::default()
                .with_players(2, 32)
                .with_rounds(8)
                .with_expectation(checks::payoffs_follow_public_goods_rule)
                .with_expectation(checks::balances_match_payoffs),
        ),
        TestScenario::new(
            "flaky-clients",
            "Flaky Clients",
            "Unknown and offline players are reported without aborting the round",
            SimulationPlan::default()
                .with_players(8, 32)
                .with_flaky_clients(0.2, 0.2)
                .with_expectation(checks::collaborator_failures_are_isolated)
                .with_expectation(checks::balances_match_payoffs)
                .with_expectation(checks::deliveries_match_positions),
        ),
        TestScenario::new(
            "demand",
            "Demand Statistics",
            "Group statistics with demand tracking and std sentinels",
            SimulationPlan::default()
                .with_players(1, 40)
                .with_demand()
                .with_expectation(checks::stat_sentinels_respected),
        ),
        TestScenario::new(
            "ties",
            "Random Tie Break",
            "Fully tied rounds must not keep arrival order",
            SimulationPlan::default()
                .with_players(6, 12)
                .with_rounds(6)
                .with_ties()
                .with_expectation(checks::ties_are_shuffled)
                .with_expectation(checks::ladder_partition_holds),
        ),
    ]
}

fn with_all_checks(plan: SimulationPlan) -> SimulationPlan {
    plan.with_expectation(checks::ranking_is_ordered_permutation)
        .with_expectation(checks::ladder_partition_holds)
        .with_expectation(checks::payoffs_follow_public_goods_rule)
        .with_expectation(checks::balances_match_payoffs)
        .with_expectation(checks::collaborator_failures_are_isolated)
        .with_expectation(checks::deliveries_match_positions)
        .with_expectation(checks::stat_sentinels_respected)
}

pub fn find_scenario(key: &str) -> Option<TestScenario> {
    catalog().into_iter().find(|scenario| scenario.key == key)
}

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    catalog()
        .into_iter()
        .map(|scenario| (scenario.key, scenario.description))
        .collect()
}

/// Expand `all` into every catalog key, keeping other names as given.
pub fn expand_scenarios(requested: &[String]) -> Vec<String> {
    let mut keys: Vec<String> = requested.iter().filter(|s| *s != "all").cloned().collect();
    if requested.iter().any(|s| s == "all") {
        for scenario in catalog() {
            if !keys.iter().any(|key| key == scenario.key) {
                keys.push(scenario.key.to_string());
            }
        }
    }
    keys
}
