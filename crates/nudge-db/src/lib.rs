//! PostgreSQL persistence layer for the nudge engine.
//!
//! Row models, connection pooling, embedded migrations, and query
//! functions with optimistic-locking semantics. The engine crate talks to
//! this layer through its `Store` abstraction; nothing here knows about
//! prompts or generation.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
