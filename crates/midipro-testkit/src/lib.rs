//! Shared fixtures for the backend test suites.

mod output;
mod sf2;

pub use output::*;
pub use sf2::*;
