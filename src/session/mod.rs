//! Open sessions and the commands that change them.
//!
//! A [`SessionController`] holds the exclusive lock on one session
//! directory and runs a background worker that owns the step store. Every
//! capture and edit is a message to that worker, so concurrent triggers
//! and edits serialize without any locking in the store itself.

mod controller;
mod worker;

pub use controller::{OpenReport, SessionController, SessionOptions};
pub use worker::{SessionHandle, SessionStatus};
