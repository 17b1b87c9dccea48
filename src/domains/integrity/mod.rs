pub mod repairer;
pub mod scanner;
pub mod service;
pub mod types;

pub use repairer::ConsistencyRepairer;
pub use scanner::ConsistencyScanner;
pub use service::ConsistencyService;
pub use types::{ConsistencyOperation, ConsistencyReport, Finding, FindingKind};
