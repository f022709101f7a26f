mod args;
mod driver;
mod reader;
mod time_range;
mod write;

pub use args::ReportFormat;
pub use driver::{MZRoiFinder, MZRoiFinderError};
pub use reader::{read_scan_table, ReadOptions, ReadProgress};
pub use time_range::{TimeRange, TimeRangeParseError};
pub use write::{build_report, write_report, write_report_to_path, ReportRow};
