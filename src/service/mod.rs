pub mod aggregate;
pub mod assemble;
pub mod category;
pub mod render;
pub mod report;
pub mod sanitize;
pub mod tax;

pub use report::{build_report, ReportRequest, ReportService};
pub use sanitize::{RawAmount, Sanitizer};
pub use tax::VatRatio;
