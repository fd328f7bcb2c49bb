pub mod api;
pub mod config;
pub mod dataset;
pub mod error;
pub mod models;
pub mod service;

pub use config::AppConfig;
pub use error::ReportError;
pub use service::{ReportRequest, ReportService};
