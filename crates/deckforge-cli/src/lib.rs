//! deckforge CLI - Command-line interface library
//!
//! This library provides the CLI functionality for deckforge, including:
//! - Build: Materialize a content plan into a deck
//! - Inspect: List library slides, shapes and slots
//! - Describe: Emit the template description for plan generation
//! - Check: Validate the library and a plan without building
//! - Restore: Reset the primary library from its backup
//!
//! # Library Usage
//!
//! ```ignore
//! use deckforge_cli::{build_command, load_settings, OutputFormat, Overrides};
//!
//! let settings = load_settings(None, &Overrides::default())?;
//! build_command(settings, "plan.json".as_ref(), false, OutputFormat::Text)?;
//! ```
//!
//! # Binary Usage
//!
//! ```bash
//! # Build a deck with ./deckforge.toml
//! deckforge build plan.json
//!
//! # Build from raw model output into a chosen file
//! deckforge build response.txt --raw --output report.pptx
//!
//! # Check a plan against the library
//! deckforge check plan.json --format json
//! ```

pub mod app;

// Re-export main entry point and types
pub use app::{
    build_command, check_command, check_plan, describe_command, inspect_command, restore_command,
};
pub use app::{
    init_logging, load_settings, read_plan, run_cli, OutputFormat, Overrides, PlanIssue,
    DEFAULT_CONFIG,
};
