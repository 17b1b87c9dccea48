// Referential-integrity core for the campus item-exchange marketplace.
//
// The document store underneath has no foreign keys, no cascading deletes
// and no cross-collection transactions, so everything a relational engine
// would enforce for free is enforced here: cascading account deletion
// across every tracked collection, and scheduled detection/repair of the
// integrity violations that accumulate in between.

pub mod config;
pub mod domains;
pub mod errors;
pub mod store;

pub use config::EngineConfig;
pub use domains::deletion::orchestrator::DeletionOrchestrator;
pub use domains::integrity::service::ConsistencyService;
pub use store::{Collection, DocumentStore, SqliteDocumentStore};
