//! Use-case services.
//!
//! # Responsibility
//! - Orchestrate aggregate operations against repository implementations.
//! - Keep outer layers (CLI, transport adapters) free of storage details.

pub mod character_service;
