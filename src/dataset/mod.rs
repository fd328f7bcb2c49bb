pub mod export;
pub mod loader;

pub use export::{export_to_csv, report_file_name, report_path};
pub use loader::{load, CsvTable, ReportData, ReportSources};
