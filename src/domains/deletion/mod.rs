pub mod assets;
pub mod collector;
pub mod orchestrator;
pub mod rating;
pub mod types;

pub use collector::ReferenceCollector;
pub use orchestrator::DeletionOrchestrator;
pub use rating::RatingRecalculator;
pub use types::{AccountDeletionReport, CollectedReferences, DeletionStage};
