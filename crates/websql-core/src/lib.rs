//! WebSQL Core - Core abstractions shared by the workbench crates
//!
//! This crate provides the fundamental traits and types that all other
//! WebSQL crates depend on. It defines:
//!
//! - `QueryEngine` - Contract of the embedded analytical engine
//! - `WebSqlError` - The error taxonomy used across the workspace
//! - `ListenerSet` / `Subscription` - Change notification fan-out
//! - Common types like `Value`, `Row`, `QueryResult`, `FileFormat`

pub mod delimited;
mod engine;
mod error;
mod format;
mod listeners;
mod types;

pub use engine::*;
pub use error::*;
pub use format::*;
pub use listeners::*;
pub use types::*;
