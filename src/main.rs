use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use plantpulse::cli::{
    assign, ingest, productivity, queue, rebuild, scope_from_args, shift, show, utilization,
};
use plantpulse::config::Config;
use plantpulse::scheduler;
use plantpulse::store::PlantStore;

#[derive(Parser)]
#[command(name = "plantpulse")]
#[command(about = "Shift assignment and production/utilization summaries for time-clock punches")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "plantpulse.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Assign shifts to unclassified punches
    Assign,

    /// Recompute production counts per day and area
    Productivity {
        /// Only today's punches
        #[arg(long, conflicts_with = "date")]
        today: bool,

        /// Only punches of this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Recompute worked time per day and employee
    Utilization {
        /// Only today's punches
        #[arg(long, conflicts_with = "date")]
        today: bool,

        /// Only punches of this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Recalculation queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },

    /// Rebuild utilization rows and fractions for a date range
    Rebuild {
        /// First date (inclusive)
        #[arg(long)]
        from: String,

        /// Last date (inclusive)
        #[arg(long)]
        to: String,

        /// Only punches from this area
        #[arg(long)]
        area: Option<i64>,

        /// Only punches from this cost center
        #[arg(long)]
        cost_center: Option<String>,
    },

    /// Import punches from a JSON file
    Ingest {
        /// JSON array of punches
        file: PathBuf,
    },

    /// Shift window management
    Shift {
        #[command(subcommand)]
        command: ShiftCommands,
    },

    /// Show summary tables
    Show {
        #[command(subcommand)]
        command: ShowCommands,
    },

    /// Run shift assignment on a timer until interrupted
    Serve,
}

#[derive(Subcommand)]
enum QueueCommands {
    /// Recalculate every pending date
    Drain,
    /// Queue a date (YYYY-MM-DD) for recalculation
    Add { date: String },
    /// List queued dates
    List,
}

#[derive(Subcommand)]
enum ShiftCommands {
    /// Create or replace a shift window
    Add {
        /// Shift id
        id: i64,
        /// Entry time (HH:MM[:SS])
        entry: String,
        /// Exit time (HH:MM[:SS]), earlier than entry for night shifts
        exit: String,
        /// Store the window but do not use it for assignment
        #[arg(long)]
        inactive: bool,
    },
    /// List shift windows
    List,
}

#[derive(Subcommand)]
enum ShowCommands {
    /// Production counts per day and area
    Productivity {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Worked time per day and employee
    Utilization {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Employee id or name
        #[arg(short, long)]
        employee: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(config: &Config) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config
    let config = Config::load(&cli.config)?;
    init_logging(&config);

    // Initialize store
    let store = PlantStore::open(&config.database_path())?;

    match cli.command {
        Commands::Assign => {
            assign::run(&store, &config)?;
        }
        Commands::Productivity { today, date } => {
            productivity::run(&store, &config, scope_from_args(today, date.as_deref())?)?;
        }
        Commands::Utilization { today, date } => {
            utilization::run(&store, &config, scope_from_args(today, date.as_deref())?)?;
        }
        Commands::Queue { command } => match command {
            QueueCommands::Drain => queue::drain(&store, &config)?,
            QueueCommands::Add { date } => queue::add(&store, &date)?,
            QueueCommands::List => queue::list(&store)?,
        },
        Commands::Rebuild {
            from,
            to,
            area,
            cost_center,
        } => {
            rebuild::run(&store, &from, &to, area, cost_center)?;
        }
        Commands::Ingest { file } => {
            ingest::run(&store, &config, &file)?;
        }
        Commands::Shift { command } => match command {
            ShiftCommands::Add {
                id,
                entry,
                exit,
                inactive,
            } => shift::add(&store, id, &entry, &exit, inactive)?,
            ShiftCommands::List => shift::list(&store)?,
        },
        Commands::Show { command } => match command {
            ShowCommands::Productivity { from, to, json } => {
                show::productivity(&store, from.as_deref(), to.as_deref(), json)?;
            }
            ShowCommands::Utilization {
                from,
                to,
                employee,
                json,
            } => {
                show::utilization(
                    &store,
                    from.as_deref(),
                    to.as_deref(),
                    employee.as_deref(),
                    json,
                )?;
            }
        },
        Commands::Serve => {
            // the scheduler opens its own store on every tick
            drop(store);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(scheduler::run(config))?;
        }
    }

    Ok(())
}
