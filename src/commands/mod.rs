//! # CLI Subcommands
//!
//! Contains modules that run the subcommands.

pub mod stat;
pub mod get;
pub mod put;
pub mod mkdsk;

use std::str::FromStr;
use crate::collection::Collection;
use crate::DYNERR;

pub const RCH: &str = "unreachable was reached";

#[derive(thiserror::Error,Debug)]
pub enum CommandError {
    #[error("Item type is unknown")]
    UnknownItemType,
    #[error("Command could not be interpreted")]
    InvalidCommand,
    #[error("Input source is not supported")]
    UnsupportedFormat,
    #[error("File not found")]
    FileNotFound
}

/// Kinds of blank images the `create` subcommand can make
#[derive(PartialEq,Clone,Copy,Debug)]
pub enum DiskType {
    SingleDensity,
    EnhancedDensity,
    DoubleDensity
}

impl FromStr for DiskType {
    type Err = CommandError;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        match s {
            "sd" => Ok(Self::SingleDensity),
            "ed" => Ok(Self::EnhancedDensity),
            "dd" => Ok(Self::DoubleDensity),
            _ => Err(CommandError::UnknownItemType)
        }
    }
}

/// Load the collection named by the `dimg` argument
fn get_collection(cmd: &clap::ArgMatches) -> Result<Collection,DYNERR> {
    let path = cmd.get_one::<String>("dimg").expect(RCH);
    crate::load_collection(path)
}

/// File list from the `file` argument, empty if none were given
fn get_files(cmd: &clap::ArgMatches) -> Vec<String> {
    match cmd.get_many::<String>("file") {
        Some(files) => files.cloned().collect(),
        None => Vec::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn disk_types() {
        assert_eq!(DiskType::from_str("ed").expect("bad type"),DiskType::EnhancedDensity);
        assert!(matches!(DiskType::from_str("qd"),Err(CommandError::UnknownItemType)));
    }
}
