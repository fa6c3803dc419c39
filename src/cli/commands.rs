use std::path::Path;
use std::sync::Arc;

use chrono::{Local, Utc};
use serde::Serialize;

use crate::app::{AppContext, Result};
use crate::daemon::{self, Daemon, DaemonState};
use crate::domain::{Category, RunReport, Snapshot, StationRecord};
use crate::facade::{Availability, DataSummary, NOT_AVAILABLE_HINT};
use crate::scheduler::SchedulerStatus;

/// Scrape now. Returns whether every category succeeded.
pub async fn run(ctx: &AppContext, category: Option<Category>, json: bool) -> Result<bool> {
    let report = match category {
        Some(category) => ctx.orchestrator.run_categories(&[category]).await,
        None => ctx.run_now().await,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(report.all_succeeded())
}

fn print_report(report: &RunReport) {
    for (category, outcome) in report.iter() {
        match &outcome.error {
            None => println!("  {:<16} {} records", category.label(), outcome.records),
            Some(error) => eprintln!("  {:<16} failed: {}", category.label(), error),
        }
    }
    println!(
        "Run complete: {} records, {} errors",
        report.total_records(),
        report.failures()
    );
}

pub fn show(ctx: &AppContext, category: Category, json: bool) -> Result<()> {
    let snapshot = match ctx.data.get(category) {
        Availability::Available(snapshot) => snapshot,
        Availability::NotAvailable => {
            if json {
                let body = serde_json::json!({
                    "available": false,
                    "category": category,
                    "message": NOT_AVAILABLE_HINT,
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                println!("{}: {}", category.label(), NOT_AVAILABLE_HINT);
            }
            return Ok(());
        }
    };

    if json {
        println!("{}", snapshot.to_json()?);
        return Ok(());
    }

    print_snapshot(&snapshot);
    Ok(())
}

fn print_snapshot(snapshot: &Snapshot) {
    println!(
        "{} ({} records, updated {})",
        snapshot.category.label(),
        snapshot.total_records,
        snapshot.last_updated.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );

    if snapshot.data.is_empty() {
        println!("No stations");
        return;
    }

    for record in &snapshot.data {
        println!("  {}", describe(record));
    }
}

fn describe(record: &StationRecord) -> String {
    let name = record.station_name().unwrap_or("?");
    let value = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());

    let readings = match record {
        StationRecord::Gauge(r) => format!(
            "TMA {}  debit {}",
            value(&r.water_level),
            value(&r.discharge)
        ),
        StationRecord::Rainfall(r) => format!(
            "1h {} ({})  1d {} ({})",
            value(&r.last_hour),
            value(&r.last_hour_intensity),
            value(&r.daily_total),
            value(&r.daily_intensity)
        ),
        StationRecord::Climatology(r) => format!(
            "{}°C  RH {}% ({})  rain 1h {}  wind {} {}",
            value(&r.temperature),
            value(&r.humidity),
            value(&r.humidity_status),
            value(&r.rain_last_hour),
            value(&r.wind_direction),
            value(&r.wind_speed)
        ),
    };

    format!(
        "{:<32} {}  battery {}",
        name,
        readings,
        record.battery().unwrap_or("-")
    )
}

#[derive(Serialize)]
struct StatusReport {
    scheduler: SchedulerStatus,
    daemon: String,
    daemon_pid: Option<u32>,
    run_in_progress: bool,
    data: DataSummary,
}

pub fn status(ctx: &AppContext, json: bool) -> Result<()> {
    let mut scheduler = ctx.get_status();
    let daemon = daemon::daemon_status(&ctx.config.storage.data_dir);
    if let DaemonState::Running(_) = daemon {
        scheduler.active = true;
    }

    let report = StatusReport {
        scheduler,
        daemon: daemon.to_string(),
        daemon_pid: match daemon {
            DaemonState::Running(pid) => Some(pid),
            _ => None,
        },
        run_in_progress: ctx.orchestrator.is_running(),
        data: ctx.data.summary(Utc::now()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Schedule: {} ({}) - {}",
        report.scheduler.description,
        report.scheduler.schedule,
        if report.scheduler.active { "active" } else { "inactive" }
    );
    println!("{}", report.daemon);
    println!("Data directory: {}", report.scheduler.data_dir.display());
    println!("Source: {}", ctx.orchestrator.source_url());
    println!();

    for entry in &report.data.categories {
        if !entry.available {
            println!("  {:<16} {}", entry.label, NOT_AVAILABLE_HINT);
            continue;
        }
        let age = entry.age_secs.map(format_age).unwrap_or_default();
        let size = entry
            .size_bytes
            .map(|b| format!("{:.1} KB", b as f64 / 1024.0))
            .unwrap_or_default();
        println!(
            "  {:<16} {:>4} records  updated {} ago  {}  {}",
            entry.label, entry.records, age, size, entry.file
        );
    }

    println!(
        "\n{} of {} categories available, {} records total",
        report.data.available(),
        report.data.categories.len(),
        report.data.total_records
    );
    Ok(())
}

fn format_age(secs: i64) -> String {
    let secs = secs.max(0);
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

pub fn clear(ctx: &AppContext, categories: &[Category]) -> Result<()> {
    use crate::store::SnapshotStore;

    let mut deleted = 0;
    for &category in categories {
        deleted += ctx.store.rotate(category)?;
    }
    println!("Deleted {} snapshot file(s)", deleted);
    Ok(())
}

pub async fn daemon_start(ctx: Arc<AppContext>) -> Result<()> {
    Daemon::new(ctx).run().await
}

pub fn daemon_stop(data_dir: &Path) -> std::result::Result<(), String> {
    let pid = daemon::stop_daemon(data_dir)?;
    println!("Stopped daemon (PID {})", pid);
    Ok(())
}

pub fn daemon_status(data_dir: &Path) {
    println!("{}", daemon::daemon_status(data_dir));
}
