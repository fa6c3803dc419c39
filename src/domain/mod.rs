pub mod category;
pub mod outcome;
pub mod record;
pub mod snapshot;

pub use category::Category;
pub use outcome::{Outcome, RunReport};
pub use record::{ClimatologyRecord, GaugeRecord, RainfallRecord, StationInfo, StationRecord};
pub use snapshot::Snapshot;
