//! Declarative dotfile and tool installation engine.
//!
//! A repository describes named *targets* in `dotfiles.toml`: how to detect
//! that a tool is present, how to install it with whichever package manager
//! the platform offers, and which configuration files to link or render
//! into the home directory.  Running the engine converges the machine to
//! that description and is idempotent.
//!
//! The public API is organised into layers:
//!
//! - **[`manifest`]**: load, expand and validate the target manifest
//! - **[`capabilities`]**: presence probes and package installers
//! - **[`resources`]**: idempotent `check + apply` file primitives
//! - **[`engine`]**: resolution, scheduling and the per-target lifecycle
//! - **[`commands`]**: top-level subcommand orchestration (`run`, `check`, `list`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod capabilities;
pub mod cli;
pub mod commands;
pub mod engine;
pub mod error;
pub mod exec;
pub mod logging;
pub mod manifest;
pub mod platform;
pub mod resources;
