use anyhow::Result;
use colored::Colorize;
use meritocracy_game::{SettlementReport, StatValue};
use std::io::Write;
use std::time::Duration;

use super::ScenarioResult;

#[allow(clippy::cast_precision_loss)]
fn success_rate(passed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (passed as f64 / total as f64) * 100.0
}

pub fn generate_console_report(
    out: &mut dyn Write,
    results: &[ScenarioResult],
    total_duration: Duration,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Settlement Test Results Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "==================================".cyan())?;

    let total_tests = results.len();
    let passed_tests = results.iter().filter(|r| r.passed).count();
    let failed_tests = total_tests - passed_tests;

    writeln!(out, "Total scenario runs: {total_tests}")?;
    writeln!(out, "Passed: {}", passed_tests.to_string().green())?;
    writeln!(out, "Failed: {}", failed_tests.to_string().red())?;
    writeln!(
        out,
        "Success rate: {:.1}%",
        success_rate(passed_tests, total_tests)
    )?;
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    for result in results {
        let status = if result.passed {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };

        writeln!(
            out,
            "{} {} (seed {})",
            status,
            result.scenario_name.bold(),
            result.seed
        )?;
        writeln!(
            out,
            "   Iterations: {}/{} successful",
            result.successful_iterations, result.iterations_run
        )?;
        writeln!(out, "   Average time: {:?}", result.average_duration)?;

        if !result.failures.is_empty() {
            writeln!(out, "   Failures:")?;
            for failure in &result.failures {
                writeln!(out, "     • {}", failure.red())?;
            }
        }
        writeln!(out)?;
    }

    let fastest = results.iter().min_by_key(|r| r.average_duration);
    let slowest = results.iter().max_by_key(|r| r.average_duration);
    if let (Some(fastest), Some(slowest)) = (fastest, slowest) {
        writeln!(out, "{}", "⚡ Performance Summary".bright_yellow().bold())?;
        writeln!(out, "{}", "=====================".yellow())?;
        writeln!(
            out,
            "Fastest: {} ({:?})",
            fastest.scenario_name.green(),
            fastest.average_duration
        )?;
        writeln!(
            out,
            "Slowest: {} ({:?})",
            slowest.scenario_name.yellow(),
            slowest.average_duration
        )?;
    }
    Ok(())
}

pub fn generate_json_report(out: &mut dyn Write, results: &[ScenarioResult]) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, results)?;
    writeln!(out)?;
    Ok(())
}

pub fn generate_markdown_report(out: &mut dyn Write, results: &[ScenarioResult]) -> Result<()> {
    writeln!(out, "# Meritocracy Settlement Test Results\n")?;

    let total_tests = results.len();
    let passed_tests = results.iter().filter(|r| r.passed).count();

    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Total scenario runs**: {total_tests}")?;
    writeln!(out, "- **Passed**: {passed_tests}")?;
    writeln!(out, "- **Failed**: {}", total_tests - passed_tests)?;
    writeln!(
        out,
        "- **Success rate**: {:.1}%\n",
        success_rate(passed_tests, total_tests)
    )?;

    writeln!(out, "## Detailed Results\n")?;
    for result in results {
        let status = if result.passed { "✅" } else { "❌" };
        writeln!(out, "### {status} {} (seed {})\n", result.scenario_name, result.seed)?;
        writeln!(
            out,
            "- **Iterations**: {}/{} successful",
            result.successful_iterations, result.iterations_run
        )?;
        writeln!(out, "- **Average time**: {:?}", result.average_duration)?;
        if !result.failures.is_empty() {
            writeln!(out, "- **Failures**:")?;
            for failure in &result.failures {
                writeln!(out, "  - {failure}")?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

fn stat(value: StatValue) -> String {
    value
        .value()
        .map_or_else(|| "NA".to_string(), |v| format!("{v:.2}"))
}

/// Human-readable table of one settled round.
pub fn generate_settlement_console(out: &mut dyn Write, report: &SettlementReport) -> Result<()> {
    let outcome = &report.outcome;
    writeln!(out, "{}", format!("🧾 Round {}", report.round).bright_cyan().bold())?;
    writeln!(
        out,
        "{:<6} {:<16} {:>12} {:>10} {:>8}",
        "Rank", "Player", "Contribution", "Payoff", "Group"
    )?;
    for (rank, (placed, record)) in outcome
        .noisy_matching
        .entries()
        .zip(&outcome.payoffs)
        .enumerate()
    {
        writeln!(
            out,
            "{:<6} {:<16} {:>12.2} {:>10.2} {:>8}",
            rank + 1,
            record.player.as_str(),
            placed.contribution(),
            record.payoff,
            record.position.label
        )?;
    }

    writeln!(out)?;
    writeln!(out, "{}", "Group statistics".bold())?;
    for (label, stats) in &outcome.group_stats {
        writeln!(
            out,
            "  {label}: avg {:.2} std {} demand avg {} std {}",
            stats.avg_contribution,
            stat(stats.std_contribution),
            stat(stats.avg_demand),
            stat(stats.std_demand)
        )?;
    }

    if !report.emit.failures.is_empty() {
        writeln!(out)?;
        for failure in &report.emit.failures {
            writeln!(out, "⚠️  {} failed: {}", failure.stage, failure.message.yellow())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(passed: bool) -> ScenarioResult {
        ScenarioResult {
            scenario_name: "Smoke".to_string(),
            seed: 7,
            passed,
            iterations_run: 2,
            successful_iterations: usize::from(passed) * 2,
            failures: if passed {
                Vec::new()
            } else {
                vec!["Iteration 1 (seed 7): boom".to_string()]
            },
            average_duration: Duration::from_millis(3),
        }
    }

    fn render(f: impl Fn(&mut dyn Write) -> Result<()>) -> String {
        let mut buf: Vec<u8> = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn markdown_lists_failures() {
        let text = render(|out| generate_markdown_report(out, &[sample(true), sample(false)]));
        assert!(text.contains("- **Total scenario runs**: 2"));
        assert!(text.contains("- **Success rate**: 50.0%"));
        assert!(text.contains("  - Iteration 1 (seed 7): boom"));
    }

    #[test]
    fn json_round_trips_results() {
        let text = render(|out| generate_json_report(out, &[sample(true)]));
        let parsed: Vec<ScenarioResult> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed[0].seed, 7);
    }

    #[test]
    fn console_handles_no_results() {
        let text = render(|out| generate_console_report(out, &[], Duration::ZERO));
        assert!(text.contains("Total scenario runs: 0"));
        assert!(text.contains("Success rate: 0.0%"));
    }

    #[test]
    fn settlement_table_lists_every_player() {
        let cfg = meritocracy_game::SettlementConfig {
            subgroup_size: 2,
            ..meritocracy_game::SettlementConfig::default()
        };
        let subs = vec![
            meritocracy_game::Submission::new("alice", 6.0),
            meritocracy_game::Submission::new("bob", 4.0),
            meritocracy_game::Submission::new("carol", 10.0),
        ];
        let report = crate::logic::simulation::settle_once(cfg, subs, 5).unwrap();
        let text = render(|out| generate_settlement_console(out, &report));
        for name in ["alice", "bob", "carol"] {
            assert!(text.contains(name));
        }
        assert!(text.contains("std NA"));
    }
}
