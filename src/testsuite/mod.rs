//! In-memory chain and JSON builders shared by unit and integration tests.

pub mod fixtures;
pub mod mock;
