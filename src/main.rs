#![deny(unsafe_code)]
pub mod commands;
mod version;

use anyhow::Result;
use clap::Parser;
use clap::builder::styling::{AnsiColor, Effects, Styles};

/// Custom styles for CLI help output
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());
use commands::cleanup::Cleanup;
use commands::command::Command;
use commands::run::Run;
use commands::verify::Verify;
use enum_dispatch::enum_dispatch;
use env_logger::Env;
use log::info;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(styles = STYLES, version = version::VERSION.as_str())]
struct Args {
    #[clap(subcommand)]
    subcommand: Subcommand,
}

#[enum_dispatch(Command)]
#[derive(Parser, Debug)]
enum Subcommand {
    #[command(display_order = 1)]
    Run(Run),
    #[command(display_order = 2)]
    Cleanup(Cleanup),
    #[command(display_order = 3)]
    Verify(Verify),
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let command_line = std::env::args().collect::<Vec<_>>().join(" ");
    let args = Args::parse();

    info!("Running watchcount version {}", version::VERSION.as_str());
    args.subcommand.execute(&command_line)
}
