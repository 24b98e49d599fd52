//! Persistence contracts for character documents.
//!
//! # Responsibility
//! - Define the versioned key-value store the services write through.
//! - Isolate SQLite details from the aggregate and the services.
//!
//! # Invariants
//! - The aggregate never reaches into storage; services pass values in and out.

pub mod character_repo;
