pub mod service;

pub use service::{CleanupOperation, CleanupReport, CleanupService};
