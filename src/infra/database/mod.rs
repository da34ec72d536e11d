//! Record Store implementations.

pub mod mongo;

pub use mongo::MongoRepository;
