use clap;
use std::path::Path;
use log::info;
use crate::STDRESULT;
use super::stat;

/// Write files from the image to the host, or dump them to stdout
pub fn extract(cmd: &clap::ArgMatches) -> STDRESULT {
    let collection = super::get_collection(cmd)?;
    let files = super::get_files(cmd);
    let out_dir = match cmd.get_one::<String>("out") {
        Some(d) => d.to_string(),
        None => ".".to_string()
    };
    let multi = collection.containers.len() > 1;
    for (c,d) in stat::select_dirents(&collection,&files)? {
        let dat = c.read_file(d);
        if cmd.get_flag("dump") {
            println!("{}",d.filename());
            crate::display_block(0,&dat);
            continue;
        }
        let host_name = match multi {
            true => format!("D{}_{}",c.index+1,d.filename()),
            false => d.filename()
        };
        let dest = Path::new(&out_dir).join(host_name);
        std::fs::write(&dest,&dat)?;
        info!("extracted {} ({} bytes)",dest.display(),dat.len());
        println!("{}",dest.display());
    }
    Ok(())
}
