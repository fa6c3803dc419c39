//! Read-only access to the latest snapshots.
//!
//! Nothing here triggers scraping. A category without a readable snapshot is
//! reported as [`Availability::NotAvailable`], which callers must present as
//! "no data yet" rather than as an error or as empty data.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Category, Snapshot};
use crate::store::SnapshotStore;

/// Message shown when a category has never been scraped
pub const NOT_AVAILABLE_HINT: &str = "Data not available yet, run the scraper first";

#[derive(Debug, Clone)]
pub enum Availability {
    Available(Snapshot),
    NotAvailable,
}

impl Availability {
    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::Available(snapshot) => Some(snapshot),
            Self::NotAvailable => None,
        }
    }

    pub fn into_snapshot(self) -> Option<Snapshot> {
        match self {
            Self::Available(snapshot) => Some(snapshot),
            Self::NotAvailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

/// Per-category entry of a [`DataSummary`]
#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub category: Category,
    pub label: &'static str,
    pub file: &'static str,
    pub available: bool,
    pub records: usize,
    pub last_updated: Option<DateTime<Utc>>,
    pub age_secs: Option<i64>,
    pub size_bytes: Option<u64>,
}

/// Availability of every category at once
#[derive(Debug, Clone, Serialize)]
pub struct DataSummary {
    pub categories: Vec<CategorySummary>,
    pub total_records: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

impl DataSummary {
    pub fn available(&self) -> usize {
        self.categories.iter().filter(|c| c.available).count()
    }
}

#[derive(Clone)]
pub struct DataAccess {
    store: Arc<dyn SnapshotStore>,
}

impl DataAccess {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    pub fn get(&self, category: Category) -> Availability {
        match self.store.load(category) {
            Some(snapshot) => Availability::Available(snapshot),
            None => Availability::NotAvailable,
        }
    }

    /// The latest snapshot, or `None` if there is none yet
    pub fn latest(&self, category: Category) -> Option<Snapshot> {
        self.get(category).into_snapshot()
    }

    pub fn summary(&self, now: DateTime<Utc>) -> DataSummary {
        let categories: Vec<CategorySummary> = Category::ALL
            .into_iter()
            .map(|category| {
                let snapshot = self.store.load(category);
                let file = self.store.file_info(category);
                CategorySummary {
                    category,
                    label: category.label(),
                    file: category.file_name(),
                    available: snapshot.is_some(),
                    records: snapshot.as_ref().map_or(0, |s| s.total_records),
                    last_updated: snapshot.as_ref().map(|s| s.last_updated),
                    age_secs: snapshot.as_ref().map(|s| s.age(now).num_seconds()),
                    size_bytes: snapshot.as_ref().and(file).map(|f| f.size_bytes),
                }
            })
            .collect();

        DataSummary {
            total_records: categories.iter().map(|c| c.records).sum(),
            last_updated: categories.iter().filter_map(|c| c.last_updated).max(),
            categories,
        }
    }
}
