//! Storage adapters for the klaxon ports.

pub mod persistence;

pub use persistence::SqliteDb;
