//! Library half of the `pwf` binary: argument parsing, configuration, and
//! the commands that inspect plans and the state cache.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod styles;
