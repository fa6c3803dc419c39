use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::domain::Category;

/// Column keys written to snapshot files.
///
/// Keys follow the labels printed on the monitoring page so the files stay
/// readable by the dashboard.
pub mod keys {
    pub const NO: &str = "NO.";
    pub const NAME: &str = "NAMA POS";
    pub const LOGGER_ID: &str = "ID LOGGER";
    pub const LOCATION: &str = "LOKASI";
    pub const RIVER_BASIN: &str = "WS";
    pub const WATERSHED: &str = "DAS";
    pub const DATE: &str = "TANGGAL";
    pub const TIME: &str = "JAM (WIB)";
    pub const BATTERY: &str = "BATERAI(volt)";

    pub const WATER_LEVEL: &str = "TMA";
    pub const DISCHARGE: &str = "DEBIT";

    pub const LAST_HOUR: &str = "1 JAM TERAKHIR";
    pub const LAST_HOUR_INTENSITY: &str = "INTENSITAS 1 JAM";
    pub const DAILY_TOTAL: &str = "AKUMULASI 1 HARI";
    pub const DAILY_INTENSITY: &str = "INTENSITAS HARIAN";

    pub mod climatology {
        pub const NO: &str = "No.";
        pub const NAME: &str = "Nama Pos";
        pub const DATE: &str = "Tanggal";
        pub const TIME: &str = "Jam";
        pub const HUMIDITY: &str = "Kelembapan";
        pub const HUMIDITY_STATUS: &str = "Kelembapan Status";
        pub const RAIN_5_MIN: &str = "Curah Hujan Per 5 Menit";
        pub const RAIN_LAST_HOUR: &str = "Curah Hujan 1 Jam Terakhir";
        pub const RAIN_STATUS: &str = "Curah Hujan Status";
        pub const PRESSURE: &str = "Tekanan(MB)";
        pub const SOLAR_RADIATION: &str = "Radiasi Matahari";
        pub const SUNSHINE_DURATION: &str = "Lama Penyinaran";
        pub const TEMPERATURE: &str = "Suhu(°C)";
        pub const WIND_DIRECTION: &str = "Arah Angin";
        pub const WIND_SPEED: &str = "Kecepatan Angin(km/h)";
        pub const EVAPORATION: &str = "Tinggi Penguapan(mm)";
        pub const BATTERY: &str = "Baterai(Volt)";
    }
}

/// Parse a cell value as a number at read time.
///
/// Returns `None` for empty cells, dashes and labels such as "Tidak Hujan".
pub fn reading(value: Option<&str>) -> Option<f64> {
    let value = value?.trim();
    if value.is_empty() || value == "-" {
        return None;
    }
    value.replace(',', ".").parse::<f64>().ok()
}

/// Columns the schema did not anticipate, kept in page order.
pub type ExtraFields = Vec<(String, String)>;

/// Station identity columns shared by gauge and rainfall tables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationInfo {
    pub number: Option<String>,
    pub name: Option<String>,
    pub logger_id: Option<String>,
    pub location: Option<String>,
    pub river_basin: Option<String>,
    pub watershed: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

impl StationInfo {
    fn slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        match key {
            keys::NO => Some(&mut self.number),
            keys::NAME => Some(&mut self.name),
            keys::LOGGER_ID => Some(&mut self.logger_id),
            keys::LOCATION => Some(&mut self.location),
            keys::RIVER_BASIN => Some(&mut self.river_basin),
            keys::WATERSHED => Some(&mut self.watershed),
            keys::DATE => Some(&mut self.date),
            keys::TIME => Some(&mut self.time),
            _ => None,
        }
    }

    fn fields(&self) -> [(&'static str, &Option<String>); 8] {
        [
            (keys::NO, &self.number),
            (keys::NAME, &self.name),
            (keys::LOGGER_ID, &self.logger_id),
            (keys::LOCATION, &self.location),
            (keys::RIVER_BASIN, &self.river_basin),
            (keys::WATERSHED, &self.watershed),
            (keys::DATE, &self.date),
            (keys::TIME, &self.time),
        ]
    }
}

/// River gauge station reading
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GaugeRecord {
    pub station: StationInfo,
    pub water_level: Option<String>,
    pub discharge: Option<String>,
    pub battery: Option<String>,
    pub extra: ExtraFields,
}

impl GaugeRecord {
    fn slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        match key {
            keys::WATER_LEVEL => Some(&mut self.water_level),
            keys::DISCHARGE => Some(&mut self.discharge),
            keys::BATTERY => Some(&mut self.battery),
            _ => self.station.slot(key),
        }
    }

    fn fields(&self) -> Vec<(&'static str, &Option<String>)> {
        let mut fields = self.station.fields().to_vec();
        fields.extend([
            (keys::WATER_LEVEL, &self.water_level),
            (keys::DISCHARGE, &self.discharge),
            (keys::BATTERY, &self.battery),
        ]);
        fields
    }

    pub fn water_level_m(&self) -> Option<f64> {
        reading(self.water_level.as_deref())
    }

    pub fn discharge_m3s(&self) -> Option<f64> {
        reading(self.discharge.as_deref())
    }
}

/// Rainfall station reading.
///
/// Daily accumulation and battery voltage are separate columns on the page
/// and are kept as separate fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RainfallRecord {
    pub station: StationInfo,
    pub last_hour: Option<String>,
    pub last_hour_intensity: Option<String>,
    pub daily_total: Option<String>,
    pub daily_intensity: Option<String>,
    pub battery: Option<String>,
    pub extra: ExtraFields,
}

impl RainfallRecord {
    fn slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        match key {
            keys::LAST_HOUR => Some(&mut self.last_hour),
            keys::LAST_HOUR_INTENSITY => Some(&mut self.last_hour_intensity),
            keys::DAILY_TOTAL => Some(&mut self.daily_total),
            keys::DAILY_INTENSITY => Some(&mut self.daily_intensity),
            keys::BATTERY => Some(&mut self.battery),
            _ => self.station.slot(key),
        }
    }

    fn fields(&self) -> Vec<(&'static str, &Option<String>)> {
        let mut fields = self.station.fields().to_vec();
        fields.extend([
            (keys::LAST_HOUR, &self.last_hour),
            (keys::LAST_HOUR_INTENSITY, &self.last_hour_intensity),
            (keys::DAILY_TOTAL, &self.daily_total),
            (keys::DAILY_INTENSITY, &self.daily_intensity),
            (keys::BATTERY, &self.battery),
        ]);
        fields
    }

    pub fn last_hour_mm(&self) -> Option<f64> {
        reading(self.last_hour.as_deref())
    }

    pub fn daily_total_mm(&self) -> Option<f64> {
        reading(self.daily_total.as_deref())
    }
}

/// Climatology station reading
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClimatologyRecord {
    pub number: Option<String>,
    pub name: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub humidity: Option<String>,
    pub humidity_status: Option<String>,
    pub rain_5_min: Option<String>,
    pub rain_last_hour: Option<String>,
    pub rain_status: Option<String>,
    pub pressure: Option<String>,
    pub solar_radiation: Option<String>,
    pub sunshine_duration: Option<String>,
    pub temperature: Option<String>,
    pub wind_direction: Option<String>,
    pub wind_speed: Option<String>,
    pub evaporation: Option<String>,
    pub battery: Option<String>,
    pub extra: ExtraFields,
}

impl ClimatologyRecord {
    fn slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        use keys::climatology as k;

        match key {
            k::NO => Some(&mut self.number),
            k::NAME => Some(&mut self.name),
            k::DATE => Some(&mut self.date),
            k::TIME => Some(&mut self.time),
            k::HUMIDITY => Some(&mut self.humidity),
            k::HUMIDITY_STATUS => Some(&mut self.humidity_status),
            k::RAIN_5_MIN => Some(&mut self.rain_5_min),
            k::RAIN_LAST_HOUR => Some(&mut self.rain_last_hour),
            k::RAIN_STATUS => Some(&mut self.rain_status),
            k::PRESSURE => Some(&mut self.pressure),
            k::SOLAR_RADIATION => Some(&mut self.solar_radiation),
            k::SUNSHINE_DURATION => Some(&mut self.sunshine_duration),
            k::TEMPERATURE => Some(&mut self.temperature),
            k::WIND_DIRECTION => Some(&mut self.wind_direction),
            k::WIND_SPEED => Some(&mut self.wind_speed),
            k::EVAPORATION => Some(&mut self.evaporation),
            k::BATTERY => Some(&mut self.battery),
            _ => None,
        }
    }

    fn fields(&self) -> Vec<(&'static str, &Option<String>)> {
        use keys::climatology as k;

        vec![
            (k::NO, &self.number),
            (k::NAME, &self.name),
            (k::DATE, &self.date),
            (k::TIME, &self.time),
            (k::HUMIDITY, &self.humidity),
            (k::HUMIDITY_STATUS, &self.humidity_status),
            (k::RAIN_5_MIN, &self.rain_5_min),
            (k::RAIN_LAST_HOUR, &self.rain_last_hour),
            (k::RAIN_STATUS, &self.rain_status),
            (k::PRESSURE, &self.pressure),
            (k::SOLAR_RADIATION, &self.solar_radiation),
            (k::SUNSHINE_DURATION, &self.sunshine_duration),
            (k::TEMPERATURE, &self.temperature),
            (k::WIND_DIRECTION, &self.wind_direction),
            (k::WIND_SPEED, &self.wind_speed),
            (k::EVAPORATION, &self.evaporation),
            (k::BATTERY, &self.battery),
        ]
    }

    pub fn humidity_percent(&self) -> Option<f64> {
        reading(self.humidity.as_deref())
    }

    pub fn rain_last_hour_mm(&self) -> Option<f64> {
        reading(self.rain_last_hour.as_deref())
    }

    pub fn temperature_c(&self) -> Option<f64> {
        reading(self.temperature.as_deref())
    }
}

/// One row of a station table, tagged by category
#[derive(Debug, Clone, PartialEq)]
pub enum StationRecord {
    Gauge(GaugeRecord),
    Rainfall(RainfallRecord),
    Climatology(ClimatologyRecord),
}

impl StationRecord {
    /// Build a record from `(key, value)` pairs.
    ///
    /// Known keys fill the typed fields, everything else lands in the extra
    /// bag in the order given. A repeated known key keeps its first value.
    /// Extra keys are made unique with a `_<n>` suffix, so a record never
    /// holds two fields under the same key.
    pub fn from_fields<I, K, V>(category: Category, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut record = match category {
            Category::Gauge => StationRecord::Gauge(GaugeRecord::default()),
            Category::Rainfall => StationRecord::Rainfall(RainfallRecord::default()),
            Category::Climatology => StationRecord::Climatology(ClimatologyRecord::default()),
        };

        for (key, value) in fields {
            let key = key.into();
            let value = value.into();
            if let Some(slot) = record.slot(&key).filter(|slot| slot.is_none()) {
                *slot = Some(value);
                continue;
            }
            let key = record.unique_key(key);
            record.extra_mut().push((key, value));
        }

        record
    }

    fn slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        match self {
            StationRecord::Gauge(r) => r.slot(key),
            StationRecord::Rainfall(r) => r.slot(key),
            StationRecord::Climatology(r) => r.slot(key),
        }
    }

    fn unique_key(&self, key: String) -> String {
        if self.get(&key).is_none() {
            return key;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}_{}", key, n);
            if self.get(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }

    fn extra_mut(&mut self) -> &mut ExtraFields {
        match self {
            StationRecord::Gauge(r) => &mut r.extra,
            StationRecord::Rainfall(r) => &mut r.extra,
            StationRecord::Climatology(r) => &mut r.extra,
        }
    }

    pub fn extra(&self) -> &ExtraFields {
        match self {
            StationRecord::Gauge(r) => &r.extra,
            StationRecord::Rainfall(r) => &r.extra,
            StationRecord::Climatology(r) => &r.extra,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            StationRecord::Gauge(_) => Category::Gauge,
            StationRecord::Rainfall(_) => Category::Rainfall,
            StationRecord::Climatology(_) => Category::Climatology,
        }
    }

    /// Present fields in column order: typed fields first, then extras
    pub fn fields(&self) -> Vec<(&str, &str)> {
        let typed = match self {
            StationRecord::Gauge(r) => r.fields(),
            StationRecord::Rainfall(r) => r.fields(),
            StationRecord::Climatology(r) => r.fields(),
        };

        typed
            .into_iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k, v)))
            .chain(self.extra().iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .collect()
    }

    /// Look up a value by its snapshot key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields()
            .into_iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    pub fn station_name(&self) -> Option<&str> {
        match self {
            StationRecord::Gauge(r) => r.station.name.as_deref(),
            StationRecord::Rainfall(r) => r.station.name.as_deref(),
            StationRecord::Climatology(r) => r.name.as_deref(),
        }
    }

    pub fn battery(&self) -> Option<&str> {
        match self {
            StationRecord::Gauge(r) => r.battery.as_deref(),
            StationRecord::Rainfall(r) => r.battery.as_deref(),
            StationRecord::Climatology(r) => r.battery.as_deref(),
        }
    }

    pub fn battery_volts(&self) -> Option<f64> {
        reading(self.battery())
    }
}

impl Serialize for StationRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = self.fields();
        let mut map = serializer.serialize_map(Some(fields.len()))?;
        for (key, value) in fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
