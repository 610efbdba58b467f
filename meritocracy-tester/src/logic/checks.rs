//! Expectations evaluated against a finished simulation.
use anyhow::{Result, ensure};
use meritocracy_game::{PlayerId, StatValue, Submission, deduplicate};
use std::collections::{HashMap, HashSet};

use super::simulation::{RoundSummary, SimulationSummary};

const EPSILON: f64 = 1e-9;

fn last_arrivals(raw: &[Submission]) -> HashMap<&PlayerId, &Submission> {
    raw.iter().map(|sub| (&sub.player, sub)).collect()
}

/// Every distinct player is ranked once, by descending final contribution.
pub fn ranking_is_ordered_permutation(summary: &SimulationSummary) -> Result<()> {
    for (idx, round) in summary.rounds.iter().enumerate() {
        let outcome = &round.report.outcome;
        let expected = deduplicate(round.raw.clone());
        let ranked: HashSet<&PlayerId> = outcome.ranking().iter().collect();
        let players: HashSet<&PlayerId> = expected.iter().map(|sub| &sub.player).collect();
        ensure!(
            outcome.ranking().len() == expected.len() && ranked == players,
            "round {}: ranking is not a permutation of the deduplicated players",
            idx + 1
        );

        let last = last_arrivals(&round.raw);
        let mut previous = f64::INFINITY;
        for placed in outcome.matching.entries() {
            let contribution = placed.contribution();
            ensure!(
                contribution <= previous,
                "round {}: {} ranked above a higher contribution",
                idx + 1,
                placed.player()
            );
            ensure!(
                last.get(placed.player())
                    .is_some_and(|sub| sub.contribution.total_cmp(&contribution).is_eq()),
                "round {}: {} settled with a stale submission",
                idx + 1,
                placed.player()
            );
            previous = contribution;
        }
    }
    Ok(())
}

/// Groups are consecutive ranking blocks labelled in order.
pub fn ladder_partition_holds(summary: &SimulationSummary) -> Result<()> {
    let k = summary.config.subgroup_size;
    for (idx, round) in summary.rounds.iter().enumerate() {
        check_partition(round, k, &summary.config.group_labels)
            .map_err(|err| err.context(format!("round {}", idx + 1)))?;
    }
    Ok(())
}

fn check_partition(round: &RoundSummary, k: usize, labels: &[String]) -> Result<()> {
    let matching = &round.report.outcome.matching;
    let n = matching.ranking.len();
    ensure!(
        matching.groups.len() == n.div_ceil(k),
        "expected {} groups, found {}",
        n.div_ceil(k),
        matching.groups.len()
    );
    ensure!(matching.bars.len() == matching.groups.len(), "bars do not mirror groups");

    let last = matching.groups.len().saturating_sub(1);
    for (g, group) in matching.groups.iter().enumerate() {
        ensure!(group.label == labels[g], "group {g} labelled {}", group.label);
        if g < last {
            ensure!(group.len() == k, "group {} holds {} members", group.label, group.len());
        } else {
            ensure!(
                (1..=k).contains(&group.len()),
                "last group {} holds {} members",
                group.label,
                group.len()
            );
        }
        for (s, member) in group.members.iter().enumerate() {
            ensure!(
                member.position.indices() == [g, s],
                "{} placed at {:?}, expected [{g}, {s}]",
                member.player(),
                member.position.indices()
            );
            ensure!(matching.ranking[g * k + s] == *member.player(), "group order breaks ranking");
        }
    }
    Ok(())
}

/// payoff = initial coins - own contribution + group total / divider
pub fn payoffs_follow_public_goods_rule(summary: &SimulationSummary) -> Result<()> {
    let initial = summary.config.initial_coins;
    let divider = summary.config.group_account_divider;
    for (idx, round) in summary.rounds.iter().enumerate() {
        let outcome = &round.report.outcome;
        ensure!(
            outcome.payoffs.len() == outcome.ranking().len(),
            "round {}: {} payoffs for {} players",
            idx + 1,
            outcome.payoffs.len(),
            outcome.ranking().len()
        );
        for (placed, record) in outcome.noisy_matching.entries().zip(&outcome.payoffs) {
            let group = &outcome.noisy_matching.groups[record.position.group];
            let total = group.account_total();
            let expected = initial - placed.contribution() + total / divider;
            ensure!(
                (record.payoff - expected).abs() < EPSILON,
                "round {}: {} paid {} instead of {expected}",
                idx + 1,
                record.player,
                record.payoff
            );
        }
    }
    Ok(())
}

/// Ledger balances equal the sum of each resolved player's payoffs.
pub fn balances_match_payoffs(summary: &SimulationSummary) -> Result<()> {
    let mut expected: HashMap<&PlayerId, f64> = HashMap::new();
    for round in &summary.rounds {
        for record in &round.report.outcome.payoffs {
            if !summary.unknown.contains(&record.player) {
                *expected.entry(&record.player).or_default() += record.payoff;
            }
        }
    }

    ensure!(
        expected.len() == summary.balances.len(),
        "{} balances credited, expected {}",
        summary.balances.len(),
        expected.len()
    );
    for (player, total) in expected {
        let credited = summary.balances.get(player).copied().unwrap_or_default();
        ensure!(
            (credited - total).abs() < EPSILON,
            "{player} credited {credited}, expected {total}"
        );
    }
    Ok(())
}

/// Lookup and delivery failures are reported per player and do not stop the round.
pub fn collaborator_failures_are_isolated(summary: &SimulationSummary) -> Result<()> {
    for (idx, round) in summary.rounds.iter().enumerate() {
        let emit = &round.report.emit;
        let ranked: HashSet<&PlayerId> = round.report.outcome.ranking().iter().collect();

        let skipped: HashSet<&PlayerId> = emit.skipped.iter().collect();
        let expected_skipped: HashSet<&PlayerId> =
            summary.unknown.iter().filter(|p| ranked.contains(p)).collect();
        ensure!(
            skipped == expected_skipped,
            "round {}: skipped {} players, expected {}",
            idx + 1,
            skipped.len(),
            expected_skipped.len()
        );

        let delivered: HashSet<&PlayerId> = emit.delivered.iter().collect();
        for player in &ranked {
            let should_deliver = !summary.unknown.contains(*player) && !summary.offline.contains(*player);
            ensure!(
                delivered.contains(player) == should_deliver,
                "round {}: delivery state wrong for {player}",
                idx + 1
            );
        }
    }

    let persisted: usize = summary
        .rounds
        .iter()
        .map(|round| round.report.outcome.ranking().len() - round.report.emit.skipped.len())
        .sum();
    if summary.config.persistence_enabled {
        ensure!(
            summary.persisted_rounds == summary.rounds.len(),
            "persisted {} of {} rounds",
            summary.persisted_rounds,
            summary.rounds.len()
        );
        ensure!(
            summary.persisted_players == persisted,
            "persisted {} player records, expected {persisted}",
            summary.persisted_players
        );
    }
    Ok(())
}

/// Delivered payloads carry every group's bars and the player's own position.
pub fn deliveries_match_positions(summary: &SimulationSummary) -> Result<()> {
    for delivered in &summary.deliveries {
        let idx = usize::try_from(delivered.round.saturating_sub(1))?;
        let round = summary.rounds.get(idx);
        let outcome = round.map(|round| &round.report.outcome);
        let record = outcome.and_then(|outcome| outcome.payoff_of(&delivered.player));
        let (Some(outcome), Some(record)) = (outcome, record) else {
            anyhow::bail!("delivery to {} has no settled record", delivered.player);
        };
        ensure!(
            delivered.position == record.position.indices(),
            "{} told position {:?}, settled at {:?}",
            delivered.player,
            delivered.position,
            record.position.indices()
        );
        ensure!(
            delivered.group_count == outcome.noisy_matching.bars.len(),
            "{} received {} bar groups",
            delivered.player,
            delivered.group_count
        );
        ensure!((delivered.payoff - record.payoff).abs() < EPSILON, "payload payoff drifted");
    }
    Ok(())
}

/// Std is only reported with at least two degrees of freedom; demand only when tracked.
pub fn stat_sentinels_respected(summary: &SimulationSummary) -> Result<()> {
    let demand_tracked = summary.config.demand_tracked;
    for round in &summary.rounds {
        let outcome = &round.report.outcome;
        for group in &outcome.matching.groups {
            let Some(stats) = outcome.group_stats.get(&group.label) else {
                anyhow::bail!("group {} has no stats", group.label);
            };
            let expect_std = group.len() > 2;
            ensure!(
                stats.std_contribution.is_available() == expect_std,
                "group {} of {} reports std {:?}",
                group.label,
                group.len(),
                stats.std_contribution
            );
            ensure!(
                stats.avg_demand.is_available() == demand_tracked,
                "group {} demand availability mismatch",
                group.label
            );
            if !demand_tracked {
                ensure!(stats.std_demand == StatValue::NotAvailable, "untracked demand std");
            }
        }
    }
    Ok(())
}

/// With all contributions tied, at least one round must leave submission order.
pub fn ties_are_shuffled(summary: &SimulationSummary) -> Result<()> {
    let shuffled = summary.rounds.iter().any(|round| {
        let arrival: Vec<PlayerId> = deduplicate(round.raw.clone())
            .into_iter()
            .map(|sub| sub.player)
            .collect();
        arrival.len() > 1 && arrival.as_slice() != round.report.outcome.ranking()
    });
    ensure!(
        shuffled,
        "tied contributions kept arrival order in all {} rounds",
        summary.rounds.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::simulation::{SimulationPlan, Simulator};
    use meritocracy_game::SettlementConfig;

    fn run(plan: &SimulationPlan, seed: u64) -> SimulationSummary {
        Simulator::new(SettlementConfig::default(), false)
            .run_plan(plan, seed)
            .unwrap()
    }

    #[test]
    fn healthy_simulation_passes_every_check() {
        let plan = SimulationPlan::default()
            .with_players(5, 30)
            .with_duplicates(0.2)
            .with_flaky_clients(0.1, 0.1)
            .with_demand();
        for seed in 0..10 {
            let summary = run(&plan, seed);
            ranking_is_ordered_permutation(&summary).unwrap();
            ladder_partition_holds(&summary).unwrap();
            payoffs_follow_public_goods_rule(&summary).unwrap();
            balances_match_payoffs(&summary).unwrap();
            collaborator_failures_are_isolated(&summary).unwrap();
            deliveries_match_positions(&summary).unwrap();
            stat_sentinels_respected(&summary).unwrap();
        }
    }

    #[test]
    fn tampered_payoff_is_caught() {
        let mut summary = run(&SimulationPlan::default().with_players(4, 4), 5);
        summary.rounds[0].report.outcome.payoffs[0].payoff += 1.0;
        assert!(payoffs_follow_public_goods_rule(&summary).is_err());
    }

    #[test]
    fn tampered_balance_is_caught() {
        let mut summary = run(&SimulationPlan::default(), 6);
        if let Some(balance) = summary.balances.values_mut().next() {
            *balance += 0.5;
        }
        assert!(balances_match_payoffs(&summary).is_err());
    }

    #[test]
    fn tied_rounds_get_shuffled() {
        let plan = SimulationPlan::default()
            .with_players(8, 8)
            .with_rounds(5)
            .with_ties();
        ties_are_shuffled(&run(&plan, 21)).unwrap();
    }
}
