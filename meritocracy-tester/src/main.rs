mod common;
mod logic;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use meritocracy_game::SettlementConfig;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use common::{load_config, load_submissions, split_csv};
use logic::{
    LogicTester, ScenarioResult, Simulator, expand_scenarios, find_scenario, list_scenarios,
    resolve_seed_inputs, settle_once,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Console,
    Json,
    Markdown,
}

#[derive(Debug, Parser)]
#[command(name = "meritocracy-tester", version)]
#[command(about = "Seeded QA harness for meritocracy round settlement")]
struct Args {
    /// Scenarios to run (comma-separated, `all` for the full catalog)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated integers, 0x hex, or `random`)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Settlement config JSON; the bundled defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured subgroup size
    #[arg(long)]
    subgroup_size: Option<usize>,

    /// Override the configured initial coins
    #[arg(long)]
    initial_coins: Option<f64>,

    /// Override the configured group account divider
    #[arg(long)]
    divider: Option<f64>,

    /// Track demand and report demand statistics
    #[arg(long)]
    demand: bool,

    /// Settle a JSON array of submissions instead of running scenarios
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let default_filter = if args.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    if args.report == ReportFormat::Console || args.output.is_some() {
        announce_banner();
    }

    let config = build_config(&args)?;
    let seed_infos = resolve_seed_inputs(&split_csv(&args.seeds))?;
    let seeds: Vec<u64> = seed_infos.iter().map(|info| info.seed).collect();
    if args.verbose {
        for info in &seed_infos {
            match &info.token {
                Some(token) => println!("🌱 Seed {} ({token})", info.seed),
                None => println!("🌱 Seed {}", info.seed),
            }
        }
    }

    if let Some(input) = &args.input {
        let submissions = load_submissions(input)?;
        let seed = seeds.first().copied().unwrap_or(logic::seeds::DEFAULT_SEED);
        let report = settle_once(config, submissions, seed)?;
        let mut output_target = OutputTarget::new(args.output.clone())?;
        match args.report {
            ReportFormat::Json => {
                serde_json::to_writer_pretty(&mut output_target, &report)?;
                writeln!(output_target)?;
            }
            ReportFormat::Console | ReportFormat::Markdown => {
                logic::reports::generate_settlement_console(output_target.writer(), &report)?;
            }
        }
        output_target.flush_inner()?;
        return Ok(());
    }

    let start_time = Instant::now();
    let scenarios = expand_scenarios(&split_csv(&args.scenarios));
    let tester = LogicTester::new(Simulator::new(config, args.verbose), args.verbose);
    let results = run_scenarios(&tester, &scenarios, &seeds, args.iterations);

    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:15} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "⚖️  Meritocracy Settlement Tester".bright_cyan().bold());
    println!("{}", "=================================".cyan());
}

fn build_config(args: &Args) -> Result<SettlementConfig> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(size) = args.subgroup_size {
        config.subgroup_size = size;
    }
    if let Some(coins) = args.initial_coins {
        config.initial_coins = coins;
    }
    if let Some(divider) = args.divider {
        config.group_account_divider = divider;
    }
    config.demand_tracked |= args.demand;
    config
        .validate()
        .context("command-line overrides produce an invalid config")?;
    Ok(config)
}

fn run_scenarios(
    tester: &LogicTester,
    scenarios: &[String],
    seeds: &[u64],
    iterations: usize,
) -> Vec<ScenarioResult> {
    let mut results = Vec::new();
    for name in scenarios {
        if let Some(scenario) = find_scenario(name) {
            results.extend(tester.run_scenario(&scenario, seeds, iterations));
        } else {
            eprintln!("⚠️  Unknown scenario: {}", name.yellow());
        }
    }
    results
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report {
        ReportFormat::Json => {
            logic::reports::generate_json_report(output_target.writer(), results)?;
        }
        ReportFormat::Markdown => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Meritocracy Settlement Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(output_target.writer(), results)?;
            }
        }
        ReportFormat::Console => {
            if results.is_empty() {
                writeln!(&mut output_target, "No scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(
                    output_target.writer(),
                    results,
                    start_time.elapsed(),
                )?;
            }
            writeln!(&mut output_target)?;
            writeln!(
                &mut output_target,
                "🏁 Total time: {:?}",
                start_time.elapsed()
            )?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            scenarios: "smoke".to_string(),
            list_scenarios: false,
            seeds: "1337".to_string(),
            iterations: 1,
            config: None,
            subgroup_size: None,
            initial_coins: None,
            divider: None,
            demand: false,
            input: None,
            report: ReportFormat::Json,
            verbose: false,
            output: None,
        }
    }

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "meritocracy-main-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let mut args = base_args();
        args.subgroup_size = Some(3);
        args.divider = Some(1.5);
        args.demand = true;
        let cfg = build_config(&args).unwrap();
        assert_eq!(cfg.subgroup_size, 3);
        assert!((cfg.group_account_divider - 1.5).abs() < f64::EPSILON);
        assert!(cfg.demand_tracked);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let mut args = base_args();
        args.subgroup_size = Some(0);
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn unknown_scenarios_are_skipped() {
        let tester = LogicTester::new(Simulator::new(SettlementConfig::default(), false), false);
        let results = run_scenarios(&tester, &["nope".to_string()], &[1], 1);
        assert!(results.is_empty());
    }

    #[test]
    fn markdown_report_written_to_file() {
        let mut args = base_args();
        args.report = ReportFormat::Markdown;
        let path = temp_path("md");
        args.output = Some(path.clone());
        let tester = LogicTester::new(Simulator::new(SettlementConfig::default(), false), false);
        let results = run_scenarios(&tester, &["smoke".to_string()], &[1337], 1);
        write_reports(&args, &results, Instant::now()).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("# Meritocracy Settlement Test Results"));
        assert!(content.contains("Smoke"));
    }

    #[test]
    fn list_scenarios_writes_to_output() {
        let mut args = base_args();
        args.list_scenarios = true;
        let path = temp_path("list");
        args.output = Some(path.clone());
        assert!(maybe_list_scenarios(&args).unwrap());
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("Available scenarios:"));
        assert!(content.contains("ties"));
    }
}
