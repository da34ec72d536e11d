//! Object Store implementations.

pub mod object_store;

pub use self::object_store::ObjectStoreStorage;
