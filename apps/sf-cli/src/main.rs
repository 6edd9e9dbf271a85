use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use sf_controls::{ReferenceTrajectory, TrapezoidProfile};

mod config;
mod error;
mod plant;
mod run;

use config::load_loop_file;
use error::CliResult;
use run::{RunOptions, RunReport, TraceRow};

#[derive(Parser)]
#[command(name = "sf-cli")]
#[command(about = "ServoFlow CLI - run periodic control loops against simulated plants", long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a loop file and build every coefficient without running
    Validate {
        /// Path to the loop YAML file
        loop_path: PathBuf,
    },
    /// Run a loop file and export its trace
    Run {
        /// Path to the loop YAML file
        loop_path: PathBuf,
        /// Pace the loop on the wall clock instead of simulated time
        #[arg(long)]
        realtime: bool,
        /// Pin the loop thread to this CPU (needs the `rt` feature to take effect)
        #[arg(long, requires = "rt_priority")]
        rt_cpu: Option<usize>,
        /// SCHED_FIFO priority for the loop thread
        #[arg(long, requires = "rt_cpu")]
        rt_priority: Option<i32>,
        /// Output file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Format::Csv)]
        format: Format,
    },
    /// Sample a trapezoid motion profile
    Profile {
        #[arg(long)]
        goal: f64,
        #[arg(long)]
        max_velocity: f64,
        /// Seconds to reach max velocity from rest
        #[arg(long)]
        time_to_max: f64,
        #[arg(long, default_value_t = 0.0)]
        start: f64,
        /// Sample spacing in seconds
        #[arg(long, default_value_t = 0.01)]
        dt: f64,
        #[arg(long, value_enum, default_value_t = Format::Csv)]
        format: Format,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Csv,
    Json,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Validate { loop_path } => cmd_validate(&loop_path),
        Commands::Run {
            loop_path,
            realtime,
            rt_cpu,
            rt_priority,
            output,
            format,
        } => {
            let options = RunOptions {
                realtime,
                rt: rt_cpu.zip(rt_priority),
            };
            cmd_run(&loop_path, options, output.as_deref(), format)
        }
        Commands::Profile {
            goal,
            max_velocity,
            time_to_max,
            start,
            dt,
            format,
        } => cmd_profile(goal, max_velocity, time_to_max, start, dt, format),
    }
}

fn cmd_validate(loop_path: &Path) -> CliResult<()> {
    println!("Validating loop file: {}", loop_path.display());
    let file = load_loop_file(loop_path)?;
    file.validate()?;
    println!(
        "✓ Loop file is valid ({} ticks of {} s)",
        file.ticks(),
        file.period_s
    );
    Ok(())
}

fn cmd_run(
    loop_path: &Path,
    options: RunOptions,
    output: Option<&Path>,
    format: Format,
) -> CliResult<()> {
    let file = load_loop_file(loop_path)?;
    let report = run::run_loop(&file, options)?;
    let text = render_report(&report, format)?;
    emit(&text, output)?;

    if let Some(TraceRow {
        t,
        reference,
        measurement,
        ..
    }) = report.final_row()
    {
        eprintln!(
            "Final: t = {:.3} s, reference = {:.4}, measurement = {:.4}",
            t, reference, measurement
        );
    }
    eprintln!(
        "Ticks: {}, overruns: {}, max latency: {:.1} us",
        report.stats.ticks,
        report.stats.overruns,
        report.stats.max_latency_s * 1e6
    );
    Ok(())
}

fn render_report(report: &RunReport, format: Format) -> CliResult<String> {
    match format {
        Format::Csv => Ok(report.to_csv()),
        Format::Json => Ok(serde_json::to_string_pretty(&report.rows)?),
    }
}

fn cmd_profile(
    goal: f64,
    max_velocity: f64,
    time_to_max: f64,
    start: f64,
    dt: f64,
    format: Format,
) -> CliResult<()> {
    let mut profile = TrapezoidProfile::new(max_velocity, time_to_max)?;
    profile.set_goal(goal, start)?;
    let samples = run::sample_profile(&profile, dt)?;

    let text = match format {
        Format::Csv => {
            let mut csv = String::from("t_s,position,velocity,acceleration\n");
            for (t, s) in &samples {
                csv.push_str(&format!(
                    "{},{},{},{}\n",
                    t, s.position, s.velocity, s.acceleration
                ));
            }
            csv
        }
        Format::Json => {
            let rows: Vec<_> = samples
                .iter()
                .map(|(t, s)| serde_json::json!({ "t": t, "state": s }))
                .collect();
            serde_json::to_string_pretty(&rows)?
        }
    };
    emit(&text, None)?;
    eprintln!(
        "Profile: peak velocity {:.4}, total {:.4} s",
        profile.peak_velocity(),
        profile.total_time()
    );
    Ok(())
}

fn emit(text: &str, output: Option<&Path>) -> CliResult<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text)?;
            eprintln!("✓ Wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;

    fn demos_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos")
    }

    #[test]
    fn demo_loop_files_validate() {
        for name in ["pid_first_order.yaml", "arm_state_space.yaml"] {
            let file = load_loop_file(&demos_dir().join(name)).unwrap();
            file.validate().unwrap();
        }
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_loop_file(Path::new("/nonexistent/loop.yaml")).unwrap_err();
        assert!(matches!(err, CliError::LoopFileRead { .. }));
        assert!(err.to_string().contains("/nonexistent/loop.yaml"));
    }

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "sf-cli",
            "run",
            "loop.yaml",
            "--realtime",
            "--rt-cpu",
            "2",
            "--rt-priority",
            "80",
            "--format",
            "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                realtime,
                rt_cpu,
                rt_priority,
                format,
                ..
            } => {
                assert!(realtime);
                assert_eq!(rt_cpu.zip(rt_priority), Some((2, 80)));
                assert_eq!(format, Format::Json);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn rt_cpu_requires_priority() {
        assert!(Cli::try_parse_from(["sf-cli", "run", "loop.yaml", "--rt-cpu", "2"]).is_err());
    }

    #[test]
    fn json_report_lists_rows() {
        let report = RunReport {
            rows: vec![TraceRow {
                t: 0.01,
                reference: 1.0,
                measurement: 0.5,
                command: 2.0,
            }],
            stats: sf_sched::CycleStats::new(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&render_report(&report, Format::Json).unwrap()).unwrap();
        assert_eq!(json[0]["command"], 2.0);
    }
}
