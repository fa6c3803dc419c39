use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Station category monitored on the source page.
///
/// Each category maps to one table region on the page and one snapshot file
/// in the data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// River gauge stations ("pos duga air")
    Gauge,
    /// Rainfall stations ("pos curah hujan")
    Rainfall,
    /// Climatology stations ("pos klimatologi")
    Climatology,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Gauge, Category::Rainfall, Category::Climatology];

    pub fn key(&self) -> &'static str {
        match self {
            Category::Gauge => "gauge",
            Category::Rainfall => "rainfall",
            Category::Climatology => "climatology",
        }
    }

    /// Human readable label as used on the monitoring site
    pub fn label(&self) -> &'static str {
        match self {
            Category::Gauge => "POS Duga Air",
            Category::Rainfall => "POS Curah Hujan",
            Category::Climatology => "POS Klimatologi",
        }
    }

    /// Name of the "latest" snapshot file inside the data directory
    pub fn file_name(&self) -> &'static str {
        match self {
            Category::Gauge => "pos_duga_air_latest.json",
            Category::Rainfall => "pos_curah_hujan_latest.json",
            Category::Climatology => "pos_klimatologi_latest.json",
        }
    }

    /// CSS selector of the category's table on the monitoring page
    pub fn table_selector(&self) -> &'static str {
        match self {
            Category::Gauge => "#awlr-table",
            Category::Rainfall => "#arr-table",
            Category::Climatology => "#aws-table",
        }
    }

    /// Selector that matches once the table has at least one body row
    pub fn ready_selector(&self) -> String {
        format!("{} tbody tr", self.table_selector())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "gauge" | "duga-air" | "awlr" => Ok(Category::Gauge),
            "rainfall" | "curah-hujan" | "arr" => Ok(Category::Rainfall),
            "climatology" | "klimatologi" | "aws" => Ok(Category::Climatology),
            other => Err(format!(
                "Unknown category '{}'. Use: gauge, rainfall or climatology",
                other
            )),
        }
    }
}
