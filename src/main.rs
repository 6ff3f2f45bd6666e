//! # Command Line Interface
//!
//! The CLI definition is in `cli.rs`, shared with the build script.
//! Subcommands are run by the `commands` module.

mod cli;

use env_logger;
#[cfg(windows)]
use colored;
use log::error;
use a8kit::commands;
use a8kit::commands::CommandError;

fn run() -> Result<(),Box<dyn std::error::Error>> {
    let matches = cli::build_cli().get_matches();

    // A bare image path lists the image
    if matches.subcommand().is_none() {
        return commands::stat::list(&matches);
    }

    if let Some(cmd) = matches.subcommand_matches("list") {
        return commands::stat::list(cmd);
    }
    if let Some(cmd) = matches.subcommand_matches("crc") {
        return commands::stat::crc(cmd);
    }
    if let Some(cmd) = matches.subcommand_matches("vtoc") {
        return commands::stat::vtoc(cmd);
    }
    if let Some(cmd) = matches.subcommand_matches("segments") {
        return commands::stat::segments(cmd);
    }
    if let Some(cmd) = matches.subcommand_matches("menu") {
        return commands::stat::menu(cmd);
    }

    // Files inside an image
    if let Some(cmd) = matches.subcommand_matches("extract") {
        return commands::get::extract(cmd);
    }
    if let Some(cmd) = matches.subcommand_matches("add") {
        return commands::put::add(cmd);
    }
    if let Some(cmd) = matches.subcommand_matches("delete") {
        return commands::put::delete(cmd);
    }

    // New images
    if let Some(cmd) = matches.subcommand_matches("create") {
        return commands::mkdsk::create(cmd);
    }
    if let Some(cmd) = matches.subcommand_matches("boot") {
        return commands::mkdsk::boot(cmd);
    }

    error!("No subcommand was found, try `a8kit --help`");
    Err(Box::new(CommandError::InvalidCommand))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    #[cfg(windows)]
    let _ = colored::control::set_virtual_terminal(true);
    if let Err(e) = run() {
        eprintln!("a8kit: {}",e);
        std::process::exit(1);
    }
}
