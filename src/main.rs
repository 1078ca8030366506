use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use digram_stats::config::Config;
use digram_stats::persistence::Result;
use digram_stats::report::{self, ReportFormat};
use digram_stats::store::SortOrder;
use digram_stats::tracker::{ResetOutcome, Tracker};
use digram_stats::types::{CommandName, ModeName};

/// Inspect and maintain a shared command-digram stats file.
#[derive(Debug, Parser)]
#[command(name = "digram-stats", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print digram statistics from a stats file.
    Report {
        /// Path to the stats file.
        #[arg(long)]
        file: PathBuf,
        /// Restrict the report to one mode.
        #[arg(long)]
        mode: Option<ModeName>,
        /// Row order.
        #[arg(long, value_enum, default_value = "descending")]
        order: OrderArg,
        /// Count filter: 0 keeps every row, -1 keeps none, a positive t
        /// keeps counts above t, any other negative t keeps counts
        /// below |t|.
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        threshold: i64,
        /// Output layout.
        #[arg(long, value_enum, default_value = "plain")]
        format: FormatArg,
        /// Commands to drop from the model (repeatable).
        #[arg(long = "exclude", value_name = "COMMAND")]
        excluded: Vec<CommandName>,
    },
    /// List every mode present in a stats file.
    Modes {
        /// Path to the stats file.
        #[arg(long)]
        file: PathBuf,
        /// Commands to drop from the model (repeatable).
        #[arg(long = "exclude", value_name = "COMMAND")]
        excluded: Vec<CommandName>,
    },
    /// Delete a stats file, respecting its lock.
    Reset {
        /// Path to the stats file.
        #[arg(long)]
        file: PathBuf,
        /// Lock file path, defaults to `<file>.lock`.
        #[arg(long)]
        lock: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OrderArg {
    Descending,
    Ascending,
    Unsorted,
}

impl From<OrderArg> for SortOrder {
    fn from(order: OrderArg) -> SortOrder {
        match order {
            OrderArg::Descending => SortOrder::Descending,
            OrderArg::Ascending => SortOrder::Ascending,
            OrderArg::Unsorted => SortOrder::Unsorted,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Plain,
    Percentage,
    Raw,
    Json,
}

impl FormatArg {
    /// The library-level layout, or `None` for the JSON document.
    fn report_format(self) -> Option<ReportFormat> {
        match self {
            FormatArg::Plain => Some(ReportFormat::Plain),
            FormatArg::Percentage => Some(ReportFormat::Percentage),
            FormatArg::Raw => Some(ReportFormat::Raw),
            FormatArg::Json => None,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "digram_stats=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Report {
            file,
            mode,
            order,
            threshold,
            format,
            excluded,
        } => {
            let config = Config::new(file).with_excluded(excluded.into_iter().collect());
            let tracker = Tracker::new(config);
            let (total, rows) = tracker.snapshot(mode.as_ref(), order.into(), threshold)?;

            match format.report_format() {
                Some(layout) => {
                    print!("{}", report::render(total, &rows, layout, None));
                    if !matches!(layout, ReportFormat::Raw) {
                        println!("{total} events total");
                    }
                }
                None => {
                    let rows: Vec<_> = rows
                        .iter()
                        .map(|(digram, count)| {
                            serde_json::json!({
                                "predecessor": digram.predecessor,
                                "command": digram.command,
                                "count": count,
                            })
                        })
                        .collect();
                    let doc = serde_json::json!({ "total": total, "digrams": rows });
                    let text = serde_json::to_string_pretty(&doc)
                        .expect("serializing plain JSON values cannot fail");
                    println!("{text}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Modes { file, excluded } => {
            let config = Config::new(file).with_excluded(excluded.into_iter().collect());
            let tracker = Tracker::new(config);
            for mode in tracker.modes()? {
                println!("{mode}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Reset { file, lock } => {
            let mut config = Config::new(file);
            if let Some(lock) = lock {
                config = config.with_lock_path(lock);
            }
            let mut tracker = Tracker::new(config);
            match tracker.reset_all()? {
                ResetOutcome::Full => {
                    println!("stats file removed");
                    Ok(ExitCode::SUCCESS)
                }
                ResetOutcome::Partial => {
                    eprintln!("stats file is locked by another process; nothing deleted");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}
