//! # posmon
//!
//! Keeps a local cache of the latest readings from a regional hydrology
//! monitoring page: river gauge ("pos duga air"), rainfall ("pos curah
//! hujan") and climatology ("pos klimatologi") stations.
//!
//! ## Architecture
//!
//! ```text
//! Scheduler / manual run → Orchestrator → SessionManager → TableExtractor → SnapshotStore
//!                                                     DataAccess ← SnapshotStore
//! ```
//!
//! - [`scraper`]: headless Chrome sessions and schema-driven table extraction
//! - [`store`]: one JSON snapshot file per category, replaced on every success
//! - [`orchestrator`]: sequential runs with per-category failure isolation
//! - [`scheduler`]: calendar-aligned recurring runs
//! - [`facade`]: read-only access for serving layers
//!
//! ## Quick Start
//!
//! ```bash
//! # Scrape once
//! posmon run
//!
//! # Print the rainfall snapshot
//! posmon show rainfall
//!
//! # Scrape every 10 minutes until interrupted
//! posmon daemon start --interval 10m
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the session
/// manager, snapshot store, orchestrator, scheduler and data access facade.
pub mod app;

/// Command-line interface using clap.
///
/// - `run [--category <c>]` - Scrape now
/// - `show <category>` - Print the latest snapshot
/// - `status` - Scheduler state and snapshot summary
/// - `clear <category|all>` - Delete latest snapshots
/// - `daemon start|stop|status` - Scheduled scraping
pub mod cli;

/// Configuration loaded from `~/.config/posmon/config.toml` and `POSMON_*`
/// environment variables.
pub mod config;

/// Foreground scheduling process guarded by a PID file.
pub mod daemon;

/// Core domain models.
///
/// - [`Category`](domain::Category): the three station types
/// - [`StationRecord`](domain::StationRecord): one table row, typed per category
/// - [`Snapshot`](domain::Snapshot): the persisted latest result set
/// - [`Outcome`](domain::Outcome) / [`RunReport`](domain::RunReport): run results
pub mod domain;

/// Read-only access to the latest snapshots.
pub mod facade;

pub mod orchestrator;

pub mod scheduler;

/// Browser sessions and station table extraction.
///
/// - [`SessionManager`](scraper::SessionManager): acquires browser sessions
/// - [`ChromeSessionManager`](scraper::ChromeSessionManager): chromiumoxide implementation
/// - [`TableExtractor`](scraper::TableExtractor): schema-driven row extraction
pub mod scraper;

/// Snapshot persistence.
///
/// - [`SnapshotStore`](store::SnapshotStore): trait defining storage operations
/// - [`FileSnapshotStore`](store::FileSnapshotStore): JSON file implementation
pub mod store;
