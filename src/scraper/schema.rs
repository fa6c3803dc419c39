//! Declarative column schemas, one per station category.
//!
//! A schema lists which column feeds which record field and how the cell is
//! cleaned. Columns are addressed either by a fixed position or by a label of
//! the first header row. Header-addressed columns are resolved against the
//! page's actual header row before the body rows are mapped, so the same
//! extractor serves all three tables.

use std::collections::{BTreeMap, HashSet};

use crate::domain::record::keys;
use crate::domain::Category;
use crate::scraper::cleanup::{Cleanup, Split};

/// Header label matcher, compared against the upper-cased header text
#[derive(Debug, Clone, Copy)]
pub enum Label {
    Exact(&'static [&'static str]),
    Prefix(&'static [&'static str]),
    Contains(&'static [&'static str]),
}

impl Label {
    pub fn matches(&self, header: &str) -> bool {
        let header = header.to_uppercase();
        match self {
            Label::Exact(labels) => labels.iter().any(|l| header == *l),
            Label::Prefix(labels) => labels.iter().any(|l| header.starts_with(l)),
            Label::Contains(labels) => labels.iter().any(|l| header.contains(l)),
        }
    }
}

/// Where a column is found in the table
#[derive(Debug, Clone, Copy)]
pub enum ColumnKey {
    /// Fixed zero-based cell index
    Position(usize),
    /// The `nth` header position whose label matches
    Header { label: Label, nth: usize },
}

/// What a column produces
#[derive(Debug, Clone, Copy)]
pub enum Target {
    Field(&'static str, Cleanup),
    Split {
        value: &'static str,
        status: &'static str,
        rule: Split,
    },
}

impl Target {
    fn keys(&self) -> impl Iterator<Item = &'static str> {
        let (first, second) = match *self {
            Target::Field(key, _) => (key, None),
            Target::Split { value, status, .. } => (value, Some(status)),
        };
        std::iter::once(first).chain(second)
    }

    fn emit(&self, raw: &str, out: &mut Vec<(String, String)>) {
        match self {
            Target::Field(key, cleanup) => out.push((key.to_string(), cleanup.apply(raw))),
            Target::Split { value, status, rule } => {
                let (number, description) = rule.apply(raw);
                out.push((value.to_string(), number));
                out.push((status.to_string(), description));
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub key: ColumnKey,
    pub target: Target,
}

const fn header(label: Label, key: &'static str, cleanup: Cleanup) -> ColumnSpec {
    ColumnSpec {
        key: ColumnKey::Header { label, nth: 0 },
        target: Target::Field(key, cleanup),
    }
}

const fn nth_header(label: Label, nth: usize, key: &'static str) -> ColumnSpec {
    ColumnSpec {
        key: ColumnKey::Header { label, nth },
        target: Target::Field(key, Cleanup::Trim),
    }
}

const fn position(index: usize, key: &'static str, cleanup: Cleanup) -> ColumnSpec {
    ColumnSpec {
        key: ColumnKey::Position(index),
        target: Target::Field(key, cleanup),
    }
}

const STATION_COLUMNS: [ColumnSpec; 8] = [
    header(Label::Exact(&["NO.", "NO"]), keys::NO, Cleanup::Trim),
    header(Label::Contains(&["NAMA"]), keys::NAME, Cleanup::Trim),
    header(Label::Contains(&["LOGGER"]), keys::LOGGER_ID, Cleanup::Trim),
    header(Label::Contains(&["LOKASI"]), keys::LOCATION, Cleanup::Trim),
    header(Label::Exact(&["WS"]), keys::RIVER_BASIN, Cleanup::Trim),
    header(Label::Exact(&["DAS"]), keys::WATERSHED, Cleanup::Trim),
    header(Label::Contains(&["TANGGAL"]), keys::DATE, Cleanup::Trim),
    header(Label::Prefix(&["JAM"]), keys::TIME, Cleanup::Trim),
];

const BATTERY_LABEL: Label = Label::Contains(&["BATERAI", "VOLT"]);
const LAST_HOUR_LABEL: Label = Label::Contains(&["1 JAM"]);
const DAILY_LABEL: Label = Label::Contains(&["AKUMULASI", "1 HARI"]);

/// Canonical header written for the rainfall battery column
pub const CANONICAL_BATTERY_HEADER: &str = "BATERAI(volt)";

/// Column schema of one category
#[derive(Debug, Clone)]
pub struct ColumnSchema {
    pub category: Category,
    pub columns: Vec<ColumnSpec>,
    canonical_battery_header: bool,
    /// Labels that normally span two columns of the first header row
    grouped: &'static [Label],
    /// Battery cell is the last cell of a row
    battery_last: bool,
}

impl ColumnSchema {
    pub fn for_category(category: Category) -> Self {
        match category {
            Category::Gauge => Self::gauge(),
            Category::Rainfall => Self::rainfall(),
            Category::Climatology => Self::climatology(),
        }
    }

    fn gauge() -> Self {
        let mut columns = STATION_COLUMNS.to_vec();
        columns.extend([
            header(Label::Contains(&["TMA", "MUKA AIR"]), keys::WATER_LEVEL, Cleanup::Trim),
            header(Label::Contains(&["DEBIT"]), keys::DISCHARGE, Cleanup::Trim),
            header(BATTERY_LABEL, keys::BATTERY, Cleanup::Battery),
        ]);

        Self {
            category: Category::Gauge,
            columns,
            canonical_battery_header: false,
            grouped: &[],
            battery_last: false,
        }
    }

    fn rainfall() -> Self {
        let mut columns = STATION_COLUMNS.to_vec();
        columns.extend([
            nth_header(LAST_HOUR_LABEL, 0, keys::LAST_HOUR),
            nth_header(LAST_HOUR_LABEL, 1, keys::LAST_HOUR_INTENSITY),
            nth_header(DAILY_LABEL, 0, keys::DAILY_TOTAL),
            nth_header(DAILY_LABEL, 1, keys::DAILY_INTENSITY),
            header(BATTERY_LABEL, keys::BATTERY, Cleanup::Battery),
        ]);

        Self {
            category: Category::Rainfall,
            columns,
            canonical_battery_header: true,
            grouped: &[LAST_HOUR_LABEL, DAILY_LABEL],
            battery_last: true,
        }
    }

    /// The climatology header row does not line up with its cells, so every
    /// column is pinned by position.
    fn climatology() -> Self {
        use keys::climatology as k;

        let columns = vec![
            position(0, k::NO, Cleanup::Trim),
            position(1, k::NAME, Cleanup::Trim),
            position(2, k::DATE, Cleanup::Trim),
            position(3, k::TIME, Cleanup::Trim),
            ColumnSpec {
                key: ColumnKey::Position(4),
                target: Target::Split {
                    value: k::HUMIDITY,
                    status: k::HUMIDITY_STATUS,
                    rule: Split::Percent,
                },
            },
            position(5, k::RAIN_5_MIN, Cleanup::Trim),
            ColumnSpec {
                key: ColumnKey::Position(6),
                target: Target::Split {
                    value: k::RAIN_LAST_HOUR,
                    status: k::RAIN_STATUS,
                    rule: Split::Millimetres,
                },
            },
            position(7, k::PRESSURE, Cleanup::Trim),
            position(8, k::SOLAR_RADIATION, Cleanup::Trim),
            position(9, k::SUNSHINE_DURATION, Cleanup::Trim),
            position(10, k::TEMPERATURE, Cleanup::Trim),
            position(11, k::WIND_DIRECTION, Cleanup::CollapseWhitespace),
            position(12, k::WIND_SPEED, Cleanup::Trim),
            position(13, k::EVAPORATION, Cleanup::Trim),
            position(14, k::BATTERY, Cleanup::Battery),
        ];

        Self {
            category: Category::Climatology,
            columns,
            canonical_battery_header: false,
            grouped: &[],
            battery_last: false,
        }
    }

    /// Normalize one header cell's text
    pub fn normalize_header(&self, raw: &str) -> String {
        let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if self.canonical_battery_header {
            let upper = text.to_uppercase();
            if upper.contains("BATERAI") || upper.contains("VOLT") {
                return CANONICAL_BATTERY_HEADER.to_string();
            }
        }
        text
    }

    /// Resolve the schema against a header row for body rows `width` cells
    /// wide.
    ///
    /// A header row shorter than its rows has lost a `colspan`. Grouped labels
    /// that appear only once are widened when that accounts for every missing
    /// position. Otherwise the battery column, when the table keeps it last,
    /// is pinned to the last cell.
    pub fn resolve_rows(&self, headers: &[String], width: usize) -> ColumnMap {
        let deficit = width.saturating_sub(headers.len());
        if deficit == 0 {
            return self.resolve(headers);
        }

        if let Some(widened) = self.widen_grouped(headers, deficit) {
            tracing::debug!("{} widened grouped headers to {:?}", self.category, widened);
            return self.resolve(&widened);
        }

        let mut map = self.resolve(headers);
        if self.battery_last {
            tracing::warn!(
                "{} battery column pinned to cell {} of a short header row",
                self.category,
                width - 1
            );
            map.pin(width - 1, Target::Field(keys::BATTERY, Cleanup::Battery));
        }
        map
    }

    fn widen_grouped(&self, headers: &[String], deficit: usize) -> Option<Vec<String>> {
        let single: Vec<usize> = self
            .grouped
            .iter()
            .filter_map(|label| {
                let mut hits = headers.iter().enumerate().filter(|(_, h)| label.matches(h));
                match (hits.next(), hits.next()) {
                    (Some((index, _)), None) => Some(index),
                    _ => None,
                }
            })
            .collect();

        if single.len() != deficit {
            return None;
        }

        let mut widened = Vec::with_capacity(headers.len() + deficit);
        for (index, label) in headers.iter().enumerate() {
            widened.push(label.clone());
            if single.contains(&index) {
                widened.push(label.clone());
            }
        }
        Some(widened)
    }

    /// Resolve the schema against the expanded first header row
    pub fn resolve(&self, headers: &[String]) -> ColumnMap {
        let mut slots = BTreeMap::new();
        let mut claimed = HashSet::new();

        for spec in &self.columns {
            let index = match spec.key {
                ColumnKey::Position(index) => Some(index),
                ColumnKey::Header { label, nth } => headers
                    .iter()
                    .enumerate()
                    .filter(|(_, h)| label.matches(h))
                    .map(|(i, _)| i)
                    .nth(nth),
            };

            match index {
                Some(index) if claimed.insert(index) => {
                    slots.insert(index, spec.target);
                }
                Some(index) => {
                    tracing::debug!("{} column {} already mapped, ignoring duplicate", self.category, index);
                }
                None => {
                    tracing::debug!("{} column for {:?} not present in header", self.category, spec.target);
                }
            }
        }

        let pinned = self
            .columns
            .iter()
            .filter_map(|spec| match spec.key {
                ColumnKey::Position(index) => Some(index),
                ColumnKey::Header { .. } => None,
            })
            .collect();

        ColumnMap {
            headers: headers.to_vec(),
            slots,
            pinned,
        }
    }
}

/// A schema bound to one table's header row
#[derive(Debug, Clone)]
pub struct ColumnMap {
    headers: Vec<String>,
    slots: BTreeMap<usize, Target>,
    pinned: Vec<usize>,
}

impl ColumnMap {
    pub fn target(&self, index: usize) -> Option<&Target> {
        self.slots.get(&index)
    }

    /// Move `target` to cell `index`, dropping any slot that held its keys
    fn pin(&mut self, index: usize, target: Target) {
        let taken: Vec<&str> = target.keys().collect();
        self.slots.retain(|_, t| !t.keys().any(|k| taken.contains(&k)));
        self.slots.insert(index, target);
        if !self.pinned.contains(&index) {
            self.pinned.push(index);
        }
    }

    /// Map one body row's cell texts to `(key, value)` pairs.
    ///
    /// Unmapped cells are keyed by their header label, or `col_<index>` when
    /// no header covers the position or the label is already taken by a
    /// mapped column. Position-pinned columns missing from a short row are
    /// emitted from an empty cell.
    pub fn map_row(&self, cells: &[String]) -> Vec<(String, String)> {
        let mut out = Vec::with_capacity(cells.len() + 2);
        let mut extra_keys: HashSet<String> = self
            .slots
            .values()
            .flat_map(Target::keys)
            .map(str::to_string)
            .collect();

        for (index, cell) in cells.iter().enumerate() {
            if let Some(target) = self.slots.get(&index) {
                target.emit(cell, &mut out);
                continue;
            }

            let key = match self.headers.get(index) {
                Some(label) if !label.is_empty() && !extra_keys.contains(label) => label.clone(),
                _ => format!("col_{}", index),
            };
            extra_keys.insert(key.clone());
            out.push((key, cell.trim().to_string()));
        }

        for index in &self.pinned {
            if *index >= cells.len() {
                if let Some(target) = self.slots.get(index) {
                    target.emit("", &mut out);
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn rainfall_headers() -> Vec<String> {
        labels(&[
            "NO.",
            "NAMA POS",
            "ID LOGGER",
            "LOKASI",
            "WS",
            "DAS",
            "TANGGAL",
            "JAM (WIB)",
            "1 JAM TERAKHIR",
            "1 JAM TERAKHIR",
            "AKUMULASI 1 HARI",
            "AKUMULASI 1 HARI",
            "BATERAI(volt)",
        ])
    }

    #[test]
    fn test_rainfall_battery_header_is_canonical() {
        let schema = ColumnSchema::for_category(Category::Rainfall);
        assert_eq!(schema.normalize_header("BATERAI\n (Volt)"), "BATERAI(volt)");
        assert_eq!(schema.normalize_header("TEGANGAN VOLT"), "BATERAI(volt)");
        assert_eq!(schema.normalize_header("  NAMA   POS "), "NAMA POS");

        let gauge = ColumnSchema::for_category(Category::Gauge);
        assert_eq!(gauge.normalize_header("BATERAI (volt)"), "BATERAI (volt)");
    }

    #[test]
    fn test_rainfall_grouped_headers_resolve_by_occurrence() {
        let schema = ColumnSchema::for_category(Category::Rainfall);
        let map = schema.resolve(&rainfall_headers());

        let cells = labels(&[
            "1", "PCH A", "HGT137", "Toboali", "Bangka", "Das Bikang", "14 Januari 2026", "09:45", "0",
            "Tidak Hujan", "12.5", "Hujan Ringan", "13.02V",
        ]);
        let fields = map.map_row(&cells);
        let get = |key: &str| fields.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());

        assert_eq!(get(keys::LAST_HOUR), Some("0"));
        assert_eq!(get(keys::LAST_HOUR_INTENSITY), Some("Tidak Hujan"));
        assert_eq!(get(keys::DAILY_TOTAL), Some("12.5"));
        assert_eq!(get(keys::DAILY_INTENSITY), Some("Hujan Ringan"));
        assert_eq!(get(keys::BATTERY), Some("13.02"));
        assert_eq!(get(keys::TIME), Some("09:45"));
    }

    #[test]
    fn test_unmapped_cells_use_header_or_position() {
        let schema = ColumnSchema::for_category(Category::Gauge);
        let map = schema.resolve(&labels(&["NO.", "NAMA POS", "STATUS"]));
        let fields = map.map_row(&labels(&["1", "PDA X", "Normal", "extra"]));

        assert!(fields.contains(&("STATUS".to_string(), "Normal".to_string())));
        assert!(fields.contains(&("col_3".to_string(), "extra".to_string())));
    }

    #[test]
    fn test_unmapped_label_never_reuses_a_mapped_key() {
        let schema = ColumnSchema::for_category(Category::Gauge);
        let map = schema.resolve(&labels(&["NO.", "NAMA POS", "STATUS", "TMA", "TMA"]));
        let fields = map.map_row(&labels(&["1", "PDA X", "Normal", "1.25", "Siaga"]));

        assert_eq!(
            fields,
            vec![
                (keys::NO.to_string(), "1".to_string()),
                (keys::NAME.to_string(), "PDA X".to_string()),
                ("STATUS".to_string(), "Normal".to_string()),
                (keys::WATER_LEVEL.to_string(), "1.25".to_string()),
                ("col_4".to_string(), "Siaga".to_string()),
            ]
        );
    }

    #[test]
    fn test_grouped_headers_widened_when_colspan_is_missing() {
        let schema = ColumnSchema::for_category(Category::Rainfall);
        let mut headers = rainfall_headers();
        headers.remove(11);
        headers.remove(9);

        let map = schema.resolve_rows(&headers, 13);

        assert!(matches!(map.target(9), Some(Target::Field(k, _)) if *k == keys::LAST_HOUR_INTENSITY));
        assert!(matches!(map.target(10), Some(Target::Field(k, _)) if *k == keys::DAILY_TOTAL));
        assert!(matches!(map.target(12), Some(Target::Field(k, _)) if *k == keys::BATTERY));
    }

    #[test]
    fn test_battery_pinned_to_last_cell_of_short_header() {
        let schema = ColumnSchema::for_category(Category::Rainfall);
        let map = schema.resolve_rows(&labels(&["NO.", "NAMA POS", "BATERAI(volt)"]), 5);
        let fields = map.map_row(&labels(&["1", "PCH A", "x", "y", "12.5V"]));
        let get = |key: &str| fields.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());

        assert_eq!(get(keys::BATTERY), Some("12.5"));
        assert_eq!(get("col_2"), Some("x"));
        assert_eq!(get("col_3"), Some("y"));
        assert_eq!(fields.iter().filter(|(k, _)| k == keys::BATTERY).count(), 1);
    }

    #[test]
    fn test_short_gauge_header_keeps_label_mapping() {
        let schema = ColumnSchema::for_category(Category::Gauge);
        let map = schema.resolve_rows(&labels(&["NO.", "NAMA POS", "TMA"]), 4);
        let fields = map.map_row(&labels(&["1", "PDA X", "1.25", "12.7"]));

        assert!(fields.contains(&(keys::WATER_LEVEL.to_string(), "1.25".to_string())));
        assert!(fields.contains(&("col_3".to_string(), "12.7".to_string())));
    }

    #[test]
    fn test_climatology_positions_ignore_headers() {
        let schema = ColumnSchema::for_category(Category::Climatology);
        let map = schema.resolve(&labels(&["Suhu", "Jam", "Nama Pos"]));

        assert!(matches!(map.target(0), Some(Target::Field(k, _)) if *k == keys::climatology::NO));
        assert!(matches!(map.target(4), Some(Target::Split { rule: Split::Percent, .. })));
        assert!(map.target(15).is_none());
    }

    #[test]
    fn test_short_climatology_row_fills_pinned_columns() {
        let schema = ColumnSchema::for_category(Category::Climatology);
        let map = schema.resolve(&[]);
        let fields = map.map_row(&labels(&["1", "PK Pangkalpinang"]));
        let get = |key: &str| fields.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());

        assert_eq!(get(keys::climatology::NAME), Some("PK Pangkalpinang"));
        assert_eq!(get(keys::climatology::TEMPERATURE), Some(""));
        assert_eq!(get(keys::climatology::BATTERY), Some("0"));
    }

    #[test]
    fn test_time_label_does_not_match_rainfall_hour_column() {
        assert!(Label::Prefix(&["JAM"]).matches("JAM (WIB)"));
        assert!(!Label::Prefix(&["JAM"]).matches("1 JAM TERAKHIR"));
    }
}
