//! CLI commands for Evidence.
//!
//! Each submodule implements a single CLI command with its argument
//! parsing and execution logic.

/// Register an image file as a new step.
pub mod capture;

/// Generate shell completion scripts.
pub mod completions;

/// Configuration viewing and management.
pub mod config;

/// Delete a step and its screenshot.
pub mod delete;

/// Render the session into a document.
pub mod export;

/// Create a new session directory.
pub mod new;

/// Set a step's notes.
pub mod notes;

/// Rename a step.
pub mod rename;

/// Move a step to another position.
pub mod reorder;

/// Record expected and actual results of a step.
pub mod results;

/// Session health and persistence state.
pub mod status;

/// List steps in order.
pub mod steps;

/// Capture screenshots dropped into a folder.
pub mod watch;
