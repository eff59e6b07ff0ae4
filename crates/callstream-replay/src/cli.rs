use std::io::{self, Write};
use std::path::PathBuf;

use callstream_core::{CallConfig, CallViewOptions};
use clap::Parser;

use crate::error::Result;
use crate::logging;
use crate::replay::{Script, replay};

#[derive(Debug, Parser)]
#[command(
    name = "callstream-replay",
    about = "Replay call snapshots through a call view and print each screen change as JSON",
    version
)]
pub struct Cli {
    /// JSON config file; CALLSTREAM_* environment variables override it.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run as an embedded widget.
    #[arg(long)]
    pub embedded: bool,

    /// Preload and wait for the host's join request.
    #[arg(long)]
    pub preload: bool,

    /// Treat the user as a passwordless guest.
    #[arg(long)]
    pub passwordless: bool,

    #[arg(long)]
    pub hide_header: bool,

    /// Emit logs as JSON lines on stderr.
    #[arg(long)]
    pub log_json: bool,

    /// Script of steps: a JSON array of snapshot/leave/reconnect objects.
    pub script: PathBuf,
}

impl Cli {
    #[must_use]
    pub fn options(&self) -> CallViewOptions {
        CallViewOptions {
            is_passwordless_user: self.passwordless,
            is_embedded: self.embedded,
            preload: self.preload,
            hide_header: self.hide_header,
        }
    }
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_json || logging::json_from_env());
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    let config = CallConfig::resolve(cli.config.as_deref())?;
    let script = Script::load(&cli.script)?;
    let screens = replay(&script, cli.options(), config)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for screen in &screens {
        serde_json::to_writer(&mut out, screen)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
