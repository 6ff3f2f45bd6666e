use clap;
use std::str::FromStr;
use log::info;
use crate::fs::{dos2,kboot};
use crate::media::DiskKind;
use crate::STDRESULT;
use super::{CommandError,DiskType,RCH};

/// Refuse to clobber an existing image
fn write_new(path: &str,dat: &[u8],force: bool) -> STDRESULT {
    if std::path::Path::new(path).exists() && !force {
        eprintln!("{} already exists, use --force to overwrite",path);
        return Err(Box::new(CommandError::InvalidCommand));
    }
    std::fs::write(path,dat)?;
    eprintln!("writing {} bytes",dat.len());
    Ok(())
}

/// Create a blank Atari DOS 2 image
pub fn create(cmd: &clap::ArgMatches) -> STDRESULT {
    let path = cmd.get_one::<String>("dimg").expect(RCH);
    let typ = DiskType::from_str(cmd.get_one::<String>("type").expect(RCH))?;
    let kind = match typ {
        DiskType::SingleDensity => DiskKind::AtariSD,
        DiskType::EnhancedDensity => DiskKind::AtariED,
        DiskType::DoubleDensity => DiskKind::AtariDD
    };
    info!("creating {}",kind.ui_name());
    let dat = dos2::create(kind)?;
    write_new(path,&dat,cmd.get_flag("force"))
}

/// Create a KBoot image that boots directly into an executable
pub fn boot(cmd: &clap::ArgMatches) -> STDRESULT {
    let xex_path = cmd.get_one::<String>("xex").expect(RCH);
    let path = cmd.get_one::<String>("dimg").expect(RCH);
    let xex = std::fs::read(xex_path)?;
    let title = cmd.get_one::<String>("title").map(|s| s.as_str());
    let author = cmd.get_one::<String>("author").map(|s| s.as_str());
    let dat = kboot::create_kboot_image(&xex,title,author)?;
    write_new(path,&dat,cmd.get_flag("force"))
}
