mod chart;
mod evidence;
mod finding;
mod report;
mod severity;

pub use chart::{Bucket, Chart};
pub use evidence::{Evidence, EvidenceKind};
pub use finding::Finding;
pub use report::{DocumentState, DocumentStatus, DumpInfo, Report, ReportSummary, Section};
pub use severity::Severity;
