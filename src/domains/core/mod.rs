pub mod batch_writer;
pub mod existence_cache;
pub mod identity;
pub mod object_storage;

pub use batch_writer::{BatchOutcome, BatchedWriter};
pub use existence_cache::ExistenceCache;
pub use identity::IdentityProvider;
pub use object_storage::ObjectStorageService;
