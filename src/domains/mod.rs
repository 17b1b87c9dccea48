pub mod cleanup;
pub mod core;
pub mod deletion;
pub mod integrity;
