//! Command-line front end for `umbra`.
//!
//! Mounts a [`ThemeEngine`](umbra::ThemeEngine) on the native platform (a
//! JSON preference file plus OS light/dark detection) and exposes its
//! operations as subcommands:
//!
//! ```text
//! umbra                 show the current theme (same as `umbra show`)
//! umbra set dark        persist a choice
//! umbra reset           forget it
//! umbra themes          list what can be chosen
//! umbra watch           follow changes made by the OS or other programs
//! ```
//!
//! [`run`] takes the writer to print to, so the whole CLI can be driven from
//! tests without a terminal.

pub mod cli;
mod commands;
mod render;

pub use cli::{Cli, Command, SetArgs, WatchArgs};
pub use commands::run;
