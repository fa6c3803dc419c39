pub mod commands;

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};

use crate::domain::Category;

#[derive(Parser)]
#[command(name = "posmon")]
#[command(
    about = "Scrapes river gauge, rainfall and climatology station tables into JSON snapshots",
    long_about = None
)]
pub struct Cli {
    /// Config file (default: ~/.config/posmon/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for snapshot files, overrides the config file
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Append logs to this file instead of stdout
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Without a subcommand, run according to the configured mode
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scrape now and save snapshots
    Run {
        /// Only scrape this category (gauge, rainfall, climatology)
        #[arg(long)]
        category: Option<Category>,

        /// Print outcomes as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the latest snapshot of a category
    Show {
        category: Category,

        /// Print the snapshot file content
        #[arg(long)]
        json: bool,
    },
    /// Show scheduler state and snapshot summary
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Delete latest snapshots
    Clear {
        /// Category to clear, or "all"
        target: ClearTarget,
    },
    /// Scheduled scraping in the foreground
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

#[derive(Subcommand)]
pub enum DaemonAction {
    /// Start scraping on the schedule until interrupted
    Start {
        /// Scrape interval (e.g., "10m", "1h"), overrides the config file
        #[arg(short, long)]
        interval: Option<String>,

        /// Skip the scrape that normally runs on start
        #[arg(long)]
        no_initial_run: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Check daemon status
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearTarget {
    All,
    One(Category),
}

impl ClearTarget {
    pub fn categories(&self) -> Vec<Category> {
        match self {
            ClearTarget::All => Category::ALL.to_vec(),
            ClearTarget::One(category) => vec![*category],
        }
    }
}

impl FromStr for ClearTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(ClearTarget::All)
        } else {
            s.parse().map(ClearTarget::One)
        }
    }
}
