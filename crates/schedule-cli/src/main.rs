//! `sched` CLI — expand, check and lay out calendar events from JSON files.
//!
//! Input is an export envelope (`{"version": "1.0", "exportDate": ..., "events": [...]}`)
//! or a bare array of events. Records that fail validation are skipped with a
//! warning on stderr.
//!
//! ## Usage
//!
//! ```sh
//! # Every occurrence in March, expanded in Berlin time
//! sched --timezone Europe/Berlin range --from 2024-03-01T00:00:00Z --to 2024-04-01T00:00:00Z -i events.json
//!
//! # One day, from stdin
//! cat events.json | sched day --date 2024-03-08
//!
//! # What overlaps the event "dentist" (recurring series expanded)
//! sched conflicts --id dentist -i events.json
//!
//! # Every overlapping pair in a week
//! sched conflicts --from 2024-03-04T00:00:00Z --to 2024-03-11T00:00:00Z -i events.json
//!
//! # Column layout for a day view
//! sched layout --date 2024-03-08 -i events.json
//!
//! # Normalize a bare array into a versioned export
//! sched export -i events.json -o backup.json
//!
//! # Settings from a TOML file; flags win over the file
//! sched --config sched.toml -v day --date 2024-03-08 -i events.json
//! ```

use std::io::{self, Read};
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use schedule_engine::codec::parse_instant;
use schedule_engine::{find_overlapping_pairs, DstPolicy, EngineConfig, LayoutSlot, Scheduler};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sched",
    version,
    about = "Recurring event expansion, conflict checks and day layout"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML file with timezone, max_expansion_steps and dst_policy
    #[arg(long, global = true)]
    config: Option<String>,

    /// IANA timezone for recurrence dates and day boundaries (default UTC)
    #[arg(long, global = true)]
    timezone: Option<String>,

    /// Cap on recurrence steps per event and query
    #[arg(long, global = true)]
    max_steps: Option<usize>,

    /// How to place occurrences that fall in a DST gap
    #[arg(long, global = true, value_enum)]
    dst_policy: Option<DstArg>,

    /// Log engine decisions at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List occurrences touching [from, to)
    Range {
        /// Window start (ISO 8601)
        #[arg(long)]
        from: String,
        /// Window end, exclusive (ISO 8601)
        #[arg(long)]
        to: String,
        /// Input file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// List occurrences on one local calendar day
    Day {
        /// The day, as YYYY-MM-DD
        #[arg(long)]
        date: String,
        #[arg(short, long)]
        input: Option<String>,
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Report overlapping events
    Conflicts {
        /// Check this stored event against everything else
        #[arg(long, conflicts_with_all = ["from", "to"])]
        id: Option<String>,
        /// Window start for pairwise checking (ISO 8601)
        #[arg(long, requires = "to")]
        from: Option<String>,
        /// Window end for pairwise checking (ISO 8601)
        #[arg(long, requires = "from")]
        to: Option<String>,
        #[arg(short, long)]
        input: Option<String>,
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Column layout for the timed occurrences on one day
    Layout {
        /// The day, as YYYY-MM-DD
        #[arg(long)]
        date: String,
        #[arg(short, long)]
        input: Option<String>,
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Base events whose title, description or category contain the query
    Search {
        /// Case-insensitive substring
        query: String,
        #[arg(short, long)]
        input: Option<String>,
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Re-export the valid input events as a versioned envelope
    Export {
        /// Timestamp recorded in the envelope (defaults to now)
        #[arg(long)]
        export_date: Option<String>,
        #[arg(short, long)]
        input: Option<String>,
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DstArg {
    Skip,
    ShiftForward,
    WallClock,
}

impl From<DstArg> for DstPolicy {
    fn from(arg: DstArg) -> Self {
        match arg {
            DstArg::Skip => DstPolicy::Skip,
            DstArg::ShiftForward => DstPolicy::ShiftForward,
            DstArg::WallClock => DstPolicy::WallClock,
        }
    }
}

/// Settings read from `--config`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    timezone: Option<String>,
    max_expansion_steps: Option<usize>,
    dst_policy: Option<DstPolicy>,
}

impl ConfigFile {
    fn load(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config file: {}", path))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PairDto<'a> {
    a: &'a str,
    b: &'a str,
    overlap_minutes: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SlotDto {
    #[serde(flatten)]
    slot: LayoutSlot,
    width: f64,
    left: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = build_config(&cli)?;
    tracing::debug!(
        timezone = %config.timezone,
        max_steps = config.max_expansion_steps,
        dst_policy = ?config.dst_policy,
        "engine configured"
    );

    match cli.command {
        Commands::Range {
            from,
            to,
            input,
            output,
        } => {
            let scheduler = load_scheduler(input.as_deref(), config)?;
            let start = parse_datetime(&from)?;
            let end = parse_datetime(&to)?;
            if end < start {
                tracing::warn!(%start, %end, "window ends before it starts, nothing to list");
            }
            let occurrences = scheduler.events_in_range(start, end);
            write_json(output.as_deref(), &occurrences)?;
        }
        Commands::Day {
            date,
            input,
            output,
        } => {
            let scheduler = load_scheduler(input.as_deref(), config)?;
            let occurrences = scheduler.events_for_date(parse_date(&date)?);
            write_json(output.as_deref(), &occurrences)?;
        }
        Commands::Conflicts {
            id,
            from,
            to,
            input,
            output,
        } => {
            let scheduler = load_scheduler(input.as_deref(), config)?;
            match (id, from, to) {
                (Some(id), _, _) => {
                    let Some(event) = scheduler.get_event(&id) else {
                        bail!("No event with id '{}' in the input", id);
                    };
                    let conflicts = scheduler.check_conflicts_expanded(event);
                    write_json(output.as_deref(), &conflicts)?;
                }
                (None, Some(from), Some(to)) => {
                    let occurrences = scheduler
                        .events_in_range(parse_datetime(&from)?, parse_datetime(&to)?);
                    let pairs: Vec<PairDto<'_>> = find_overlapping_pairs(&occurrences)
                        .iter()
                        .map(|c| PairDto {
                            a: &c.a.id,
                            b: &c.b.id,
                            overlap_minutes: c.overlap_minutes,
                        })
                        .collect();
                    write_json(output.as_deref(), &pairs)?;
                }
                _ => bail!("conflicts needs either --id or both --from and --to"),
            }
        }
        Commands::Layout {
            date,
            input,
            output,
        } => {
            let scheduler = load_scheduler(input.as_deref(), config)?;
            let slots: Vec<SlotDto> = scheduler
                .layout_for_date(parse_date(&date)?)
                .into_iter()
                .map(|slot| SlotDto {
                    width: slot.width_fraction(),
                    left: slot.left_fraction(),
                    slot,
                })
                .collect();
            write_json(output.as_deref(), &slots)?;
        }
        Commands::Search {
            query,
            input,
            output,
        } => {
            let scheduler = load_scheduler(input.as_deref(), config)?;
            write_json(output.as_deref(), &scheduler.search(&query))?;
        }
        Commands::Export {
            export_date,
            input,
            output,
        } => {
            let scheduler = load_scheduler(input.as_deref(), config)?;
            let exported_at = match export_date {
                Some(raw) => parse_datetime(&raw)?,
                None => Utc::now(),
            };
            let json = scheduler
                .export_json(exported_at)
                .context("Failed to export events")?;
            write_output(output.as_deref(), &format!("{}\n", json))?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Layer the config file under the command-line flags.
fn build_config(cli: &Cli) -> Result<EngineConfig> {
    let file = match cli.config.as_deref() {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };

    let mut config = match cli.timezone.as_deref().or(file.timezone.as_deref()) {
        Some(name) => EngineConfig::with_timezone(name)?,
        None => EngineConfig::default(),
    };
    if let Some(steps) = cli.max_steps.or(file.max_expansion_steps) {
        config = config.max_expansion_steps(steps);
    }
    if let Some(policy) = cli.dst_policy.map(DstPolicy::from).or(file.dst_policy) {
        config = config.dst_policy(policy);
    }
    Ok(config)
}

fn load_scheduler(input: Option<&str>, config: EngineConfig) -> Result<Scheduler> {
    let data = read_input(input)?;
    let mut scheduler = Scheduler::new(config);
    let report = scheduler
        .import_json(&data)
        .context("Failed to read events")?;
    if !report.failures.is_empty() {
        tracing::warn!(
            skipped = report.failures.len(),
            loaded = report.imported.len(),
            "some input events were invalid and skipped"
        );
    }
    Ok(scheduler)
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    parse_instant(s).with_context(|| format!("Invalid datetime '{}'", s))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_json<T: Serialize + ?Sized>(path: Option<&str>, value: &T) -> Result<()> {
    let pretty = serde_json::to_string_pretty(value)?;
    write_output(path, &format!("{}\n", pretty))
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(Path::new(path), content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
