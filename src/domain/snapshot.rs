use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::app::{PosmonError, Result};
use crate::domain::{Category, StationRecord};

/// The latest result set of one category, as persisted on disk.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<Utc>,
    pub total_records: usize,
    pub source_url: String,
    #[serde(with = "iso8601")]
    pub last_updated: DateTime<Utc>,
    pub data: Vec<StationRecord>,
    #[serde(skip)]
    pub category: Category,
}

/// On-disk shape used when reading a snapshot back
#[derive(Deserialize)]
struct RawSnapshot {
    #[serde(with = "iso8601")]
    timestamp: DateTime<Utc>,
    total_records: usize,
    source_url: String,
    #[serde(with = "iso8601")]
    last_updated: DateTime<Utc>,
    data: Vec<OrderedFields>,
}

/// One record's key/value pairs in the order they appear in the file
struct OrderedFields(Vec<(String, String)>);

impl<'de> Deserialize<'de> for OrderedFields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = OrderedFields;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of string fields")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
                let mut fields = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, String>()? {
                    fields.push(entry);
                }
                Ok(OrderedFields(fields))
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

impl Snapshot {
    /// Create a snapshot for records scraped at `scraped_at`.
    ///
    /// `total_records` is always derived from `data`.
    pub fn new(
        category: Category,
        source_url: impl Into<String>,
        data: Vec<StationRecord>,
        scraped_at: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp: scraped_at,
            total_records: data.len(),
            source_url: source_url.into(),
            last_updated: scraped_at,
            data,
            category,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a snapshot file's content for `category`.
    ///
    /// A file whose `total_records` disagrees with its `data` is rejected.
    pub fn from_json(category: Category, json: &str) -> Result<Self> {
        let raw: RawSnapshot = serde_json::from_str(json)?;

        if raw.total_records != raw.data.len() {
            return Err(PosmonError::Parse(format!(
                "total_records is {} but data holds {} records",
                raw.total_records,
                raw.data.len()
            )));
        }

        let data = raw
            .data
            .into_iter()
            .map(|OrderedFields(fields)| StationRecord::from_fields(category, fields))
            .collect();

        Ok(Self {
            timestamp: raw.timestamp,
            total_records: raw.total_records,
            source_url: raw.source_url,
            last_updated: raw.last_updated,
            data,
            category,
        })
    }

    /// Time elapsed since the snapshot was last updated
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.last_updated)
    }
}

/// ISO-8601 timestamps with millisecond precision and a `Z` suffix.
mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::keys;
    use chrono::TimeZone;

    fn sample() -> Snapshot {
        let scraped_at = Utc.with_ymd_and_hms(2026, 1, 14, 2, 45, 0).unwrap();
        let records = vec![
            StationRecord::from_fields(Category::Rainfall, [(keys::NAME, "PCH A"), (keys::BATTERY, "12.5")]),
            StationRecord::from_fields(Category::Rainfall, [(keys::NAME, "PCH B"), (keys::BATTERY, "0")]),
        ];
        Snapshot::new(Category::Rainfall, "https://example.com/monitoring", records, scraped_at)
    }

    #[test]
    fn test_total_records_matches_data() {
        let snapshot = sample();
        assert_eq!(snapshot.total_records, snapshot.data.len());
        assert_eq!(snapshot.timestamp, snapshot.last_updated);
    }

    #[test]
    fn test_json_shape() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["timestamp"], "2026-01-14T02:45:00.000Z");
        assert_eq!(value["total_records"], 2);
        assert_eq!(value["source_url"], "https://example.com/monitoring");
        assert_eq!(value["data"][0]["NAMA POS"], "PCH A");
        assert_eq!(value["data"][1]["BATERAI(volt)"], "0");
        assert!(value.get("category").is_none());
    }

    #[test]
    fn test_from_json_reads_written_file() {
        let snapshot = sample();
        let parsed = Snapshot::from_json(Category::Rainfall, &snapshot.to_json().unwrap()).unwrap();

        assert_eq!(parsed.total_records, 2);
        assert_eq!(parsed.last_updated, snapshot.last_updated);
        assert_eq!(parsed.data, snapshot.data);
    }

    #[test]
    fn test_from_json_accepts_javascript_timestamps() {
        let json = r#"{
            "timestamp": "2026-01-14T02:45:12.345Z",
            "total_records": 1,
            "source_url": "https://example.com",
            "last_updated": "2026-01-14T02:45:12.345Z",
            "data": [{"NAMA POS": "PDA X", "TMA": "1.2"}]
        }"#;
        let snapshot = Snapshot::from_json(Category::Gauge, json).unwrap();
        assert_eq!(snapshot.data[0].get(keys::WATER_LEVEL), Some("1.2"));
    }

    #[test]
    fn test_from_json_rejects_inconsistent_count() {
        let json = r#"{
            "timestamp": "2026-01-14T02:45:00.000Z",
            "total_records": 5,
            "source_url": "https://example.com",
            "last_updated": "2026-01-14T02:45:00.000Z",
            "data": []
        }"#;
        assert!(Snapshot::from_json(Category::Gauge, json).is_err());
    }

    #[test]
    fn test_extras_keep_page_order_after_reload() {
        let scraped_at = Utc.with_ymd_and_hms(2026, 1, 14, 2, 45, 0).unwrap();
        let record = StationRecord::from_fields(
            Category::Gauge,
            [(keys::NAME, "PDA X"), ("ZONA", "1"), ("WILAYAH", "2"), ("ARAH", "3")],
        );
        let snapshot = Snapshot::new(Category::Gauge, "https://example.com", vec![record], scraped_at);

        let parsed = Snapshot::from_json(Category::Gauge, &snapshot.to_json().unwrap()).unwrap();
        let extras: Vec<&str> = parsed.data[0].extra().iter().map(|(k, _)| k.as_str()).collect();

        assert_eq!(extras, ["ZONA", "WILAYAH", "ARAH"]);
        assert_eq!(parsed.data, snapshot.data);
    }
}
