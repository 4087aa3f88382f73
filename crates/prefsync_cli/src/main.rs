//! prefsync CLI
//!
//! Command-line access to a prefsync profile store.
//!
//! # Commands
//!
//! - `create`, `get`, `pull`, `push`, `delete` - profile operations
//! - `list`, `last-change`, `last-contact` - diagnostics
//! - `sweep` - run one clearance sweep
//! - `compact` - rewrite the profile log
//! - `schedule` - run the clearance sweep periodically until interrupted

mod commands;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use prefsync_core::ProfileId;
use prefsync_server::SyncRequest;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// prefsync command-line tools.
#[derive(Parser)]
#[command(name = "prefsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the data directory
    #[arg(global = true, short, long)]
    data: Option<PathBuf>,

    /// Path to a JSON configuration file
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a profile
    Create {
        /// Use this identifier instead of generating one
        #[arg(long)]
        id: Option<String>,
    },

    /// Show a profile
    Get {
        /// Profile identifier
        id: String,
    },

    /// Show a profile only if it is newer than the given change time
    Pull {
        /// Profile identifier
        id: String,

        /// The client's last change (RFC 3339)
        #[arg(long)]
        since: DateTime<Utc>,
    },

    /// Offer new preferences for a profile
    Push {
        /// Profile identifier
        id: String,

        /// When the preferences were changed (RFC 3339)
        #[arg(long)]
        changed: DateTime<Utc>,

        /// The preferences document
        #[arg(long)]
        payload: Option<String>,

        /// Overwrite regardless of timestamps
        #[arg(short, long)]
        force: bool,
    },

    /// Tombstone a profile
    Delete {
        /// Profile identifier
        id: String,

        /// Final preferences kept on the tombstone
        #[arg(long)]
        payload: Option<String>,
    },

    /// List profiles
    List {
        /// Only tombstoned profiles
        #[arg(short, long)]
        tombstoned: bool,
    },

    /// Show when a profile was last changed
    LastChange {
        /// Profile identifier
        id: String,
    },

    /// Show when a profile was last contacted
    LastContact {
        /// Profile identifier
        id: String,
    },

    /// Delete tombstoned and abandoned profiles now
    Sweep,

    /// Rewrite the profile log, keeping only live records
    Compact,

    /// Run the clearance sweep on its cadence until Ctrl-C
    Schedule,

    /// Show version information
    Version,
}

impl Commands {
    /// Maps profile commands to a server request.
    fn into_request(self) -> Option<SyncRequest> {
        let request = match self {
            Commands::Create { id } => SyncRequest::Create { id },
            Commands::Get { id } => SyncRequest::Get { id: id.into() },
            Commands::Pull { id, since } => SyncRequest::Pull {
                id: ProfileId::from(id),
                since,
            },
            Commands::Push {
                id,
                changed,
                payload,
                force,
            } => SyncRequest::Push {
                id: id.into(),
                changed,
                preferences: payload,
                force,
            },
            Commands::Delete { id, payload } => SyncRequest::Delete {
                id: id.into(),
                preferences: payload,
            },
            Commands::List { tombstoned: false } => SyncRequest::ListAll,
            Commands::List { tombstoned: true } => SyncRequest::ListTombstoned,
            Commands::LastChange { id } => SyncRequest::LastChange { id: id.into() },
            Commands::LastContact { id } => SyncRequest::LastContact { id: id.into() },
            Commands::Sweep => SyncRequest::Sweep,
            Commands::Compact | Commands::Schedule | Commands::Version => return None,
        };
        Some(request)
    }
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for JSON output
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Version => {
            println!("prefsync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("prefsync core v{}", prefsync_core::VERSION);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Compact => {
            let data = cli.data.ok_or("Data directory required for compact")?;
            commands::maintenance::compact(&data)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Schedule => {
            let data = cli.data.ok_or("Data directory required for schedule")?;
            let config = commands::load_config(cli.config.as_deref())?;
            commands::maintenance::schedule(&data, config)?;
            Ok(ExitCode::SUCCESS)
        }
        command => {
            let data = cli.data.ok_or("Data directory required")?;
            let config = commands::load_config(cli.config.as_deref())?;
            let request = command
                .into_request()
                .ok_or("Command does not map to a profile request")?;
            commands::profile::run(&data, config, request)
        }
    }
}
