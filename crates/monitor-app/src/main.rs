//! Monitor entry point.
//!
//! Loads an optional TOML config, runs the given scripts and `-e`
//! commands, then reads commands from standard input until `quit` or
//! end of input.

mod demo;
mod stdio;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use monitor_terminal::Monitor;
use monitor_terminal::diagnostics::print_error;
use monitor_types::config::{MonitorConfig, load_config};

use stdio::StdioInteraction;

#[derive(Debug, Parser)]
#[command(
    name = "monitor",
    about = "Interactive command shell for emulated machines",
    version
)]
struct Args {
    /// TOML file with a `[monitor]` table
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a command after the scripts (repeatable)
    #[arg(short, long = "execute", value_name = "COMMAND")]
    execute: Vec<String>,

    /// Create a demo machine with a few peripherals
    #[arg(long)]
    demo: bool,

    /// Do not print a prompt
    #[arg(long)]
    plain: bool,

    /// Exit after the scripts and commands instead of reading stdin
    #[arg(long)]
    batch: bool,

    /// Scripts to include before the prompt
    scripts: Vec<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => MonitorConfig::default(),
    };
    log::info!("Starting monitor (numbers: {})", config.number_format);

    let mut monitor = Monitor::new(&config);
    let mut io = StdioInteraction::new();
    if args.demo {
        demo::install(&mut monitor).context("failed to create the demo machine")?;
    }

    for script in &args.scripts {
        let ok = monitor
            .include(&script.to_string_lossy(), &mut io)
            .with_context(|| format!("script {} aborted", script.display()))?;
        if !ok {
            log::warn!("script {} stopped at a failing command", script.display());
        }
        if monitor.quit_requested() {
            return Ok(());
        }
    }

    for command in &args.execute {
        if let Err(e) = monitor.parse(command, &mut io) {
            print_error(command, &e, &mut io);
        }
        if monitor.quit_requested() {
            return Ok(());
        }
    }

    if !args.batch {
        repl(&mut monitor, &mut io, !args.plain);
    }
    io.flush();
    Ok(())
}

fn repl(monitor: &mut Monitor, io: &mut StdioInteraction, show_prompt: bool) {
    use monitor_terminal::CommandInteraction;

    loop {
        if show_prompt {
            io.write(&monitor.prompt());
        }
        let Some(line) = io.read_line() else {
            break;
        };
        if let Err(e) = monitor.parse(&line, io) {
            print_error(&line, &e, io);
        }
        if monitor.quit_requested() {
            break;
        }
    }
    log::debug!("leaving the prompt");
}
