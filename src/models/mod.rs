pub mod directory;
pub mod line;
pub mod profile;
pub mod report;
pub mod warning;

pub use directory::ServiceDirectory;
pub use line::{LineId, SubscriberLine, UsageEvent};
pub use profile::{
    AttributeColumn, ClientProfile, ColumnSource, ColumnSpec, CounterRule, DataVolumeSource,
    DirectorySchema, RosterCharge, RosterSchema, UsageSchema,
};
pub use report::{BillingPeriod, RenderedReport, ReportArtifact, ReportRow, ReportRun, TaxFigures};
pub use warning::{FieldWarning, ParseIssue};
