//! Evidence - step recording for manual test runs
//!
//! Evidence turns screenshots taken during a manual test into an ordered,
//! editable list of steps stored in a crash-safe session directory, and
//! renders that list into a shareable document.

pub mod capture;
pub mod config;
pub mod error;
pub mod export;
pub mod session;
pub mod storage;

pub use error::{Result, SessionError};
