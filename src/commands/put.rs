use clap;
use std::path::Path;
use log::info;
use crate::STDRESULT;
use super::CommandError;

/// Output path, defaults to overwriting the input image
fn save(collection: &crate::collection::Collection,cmd: &clap::ArgMatches) -> STDRESULT {
    let dest = cmd.get_one::<String>("out").map(|s| s.as_str());
    crate::save_collection(collection,dest)
}

/// Copy host files into the image, the image is saved afterwards
pub fn add(cmd: &clap::ArgMatches) -> STDRESULT {
    let mut collection = super::get_collection(cmd)?;
    let files = super::get_files(cmd);
    if files.is_empty() {
        eprintln!("no files to add");
        return Err(Box::new(CommandError::InvalidCommand));
    }
    let prefix = match cmd.get_one::<String>("disk") {
        Some(d) => format!("{}:",d),
        None => String::new()
    };
    for host_path in &files {
        let dat = std::fs::read(host_path)?;
        let name = match Path::new(host_path).file_name() {
            Some(s) => s.to_string_lossy().to_string(),
            None => return Err(Box::new(CommandError::InvalidCommand))
        };
        collection.write_file(&[prefix.as_str(),&name].concat(),&dat)?;
        info!("added {}",name);
    }
    save(&collection,cmd)
}

/// Remove files from the image, the image is saved afterwards
pub fn delete(cmd: &clap::ArgMatches) -> STDRESULT {
    let mut collection = super::get_collection(cmd)?;
    let files = super::get_files(cmd);
    if files.is_empty() {
        eprintln!("no files to delete");
        return Err(Box::new(CommandError::InvalidCommand));
    }
    for spec in &files {
        collection.delete_file(spec)?;
        info!("deleted {}",spec);
    }
    save(&collection,cmd)
}
