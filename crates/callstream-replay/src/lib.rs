#![forbid(unsafe_code)]

//! Scripted replay of call snapshots through a [`CallView`](callstream_core::CallView).

pub mod cli;
pub mod error;
pub mod logging;
pub mod replay;

pub use cli::{Cli, run, run_from_env};
pub use error::{ReplayError, Result};
pub use replay::{Script, Step, replay};
