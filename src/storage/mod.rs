//! Storage layer for evidence sessions

pub mod lock;
pub mod models;
pub mod persist;
pub mod store;

pub use lock::SessionLock;
pub use models::*;
pub use persist::{LoadedSession, SessionDir};
pub use store::{Snapshot, StepStore};
