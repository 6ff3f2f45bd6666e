use clap;
use colored::Colorize;
use log::warn;
use crate::collection::Collection;
use crate::container::Container;
use crate::fs::Dirent;
use crate::STDRESULT;
use super::{CommandError,RCH};

/// Disk label used when a collection holds more than one container
fn label(collection: &Collection,c: &Container) -> String {
    match collection.containers.len() {
        1 => String::new(),
        _ => format!("D{}:",c.index+1)
    }
}

/// Dirents named on the command line, or every dirent if none were named
pub(super) fn select_dirents<'a>(collection: &'a Collection,files: &[String]) -> Result<Vec<(&'a Container,&'a Dirent)>,CommandError> {
    let mut ans = Vec::new();
    if files.is_empty() {
        for c in collection.iter_containers() {
            for d in c.iter_dirents() {
                if d.in_use {
                    ans.push((c,d));
                }
            }
        }
        return Ok(ans);
    }
    for f in files {
        match collection.find_dirent(f,false) {
            Ok(x) => ans.push(x),
            Err(e) => {
                eprintln!("{}",e);
                return Err(CommandError::FileNotFound);
            }
        }
    }
    Ok(ans)
}

pub fn list(cmd: &clap::ArgMatches) -> STDRESULT {
    let collection = super::get_collection(cmd)?;
    for c in collection.iter_containers() {
        let fs_name = match c.filesystem() {
            Some(fs) => fs.ui_name(),
            None => "no filesystem"
        };
        println!("{}{}: {}, {}",label(&collection,c),c.pathname,c.media,fs_name);
        let fs = match c.filesystem() {
            Some(fs) => fs,
            None => continue
        };
        for d in fs.dirents() {
            match &d.error {
                Some(err) => println!("{} {}",d,err.red()),
                None => println!("{}",d)
            }
        }
        if let Some(free) = fs.num_free_sectors() {
            println!("{} free sectors",free);
        }
    }
    Ok(())
}

pub fn crc(cmd: &clap::ArgMatches) -> STDRESULT {
    let collection = super::get_collection(cmd)?;
    let files = super::get_files(cmd);
    for (c,d) in select_dirents(&collection,&files)? {
        let dat = c.read_file(d);
        println!("{}{}: {:08x}",label(&collection,c),d.filename(),crc32fast::hash(&dat));
    }
    Ok(())
}

/// Render a free sector map, `.` is free and `X` is used
fn sector_map_lines(map: &[bool],per_row: usize) -> Vec<String> {
    map.chunks(per_row).enumerate().map(|(row,chunk)| {
        let cells: String = chunk.iter().map(|free| match free {
            true => '.',
            false => 'X'
        }).collect();
        format!("{:04}: {}",row*per_row,cells)
    }).collect()
}

pub fn vtoc(cmd: &clap::ArgMatches) -> STDRESULT {
    let collection = super::get_collection(cmd)?;
    let mut found = false;
    for c in collection.iter_containers() {
        let fs = match c.filesystem() {
            Some(fs) => fs,
            None => continue
        };
        if let Some(map) = fs.free_sector_map() {
            found = true;
            println!("{}{}: {}",label(&collection,c),c.pathname,fs.ui_name());
            for line in fs.vtoc_info() {
                println!("    {}",line);
            }
            for line in sector_map_lines(&map,64) {
                println!("{}",line);
            }
            if let Some(free) = fs.num_free_sectors() {
                println!("{} free sectors",free);
            }
        }
    }
    match found {
        true => Ok(()),
        false => {
            warn!("no container in {} has a VTOC",collection.pathname);
            Err(Box::new(CommandError::UnsupportedFormat))
        }
    }
}

pub fn segments(cmd: &clap::ArgMatches) -> STDRESULT {
    let path = cmd.get_one::<String>("dimg").expect(RCH);
    let collection = match cmd.get_one::<String>("session") {
        Some(session) => crate::load_session(path,session)?,
        None => crate::load_collection(path)?
    };
    for line in collection.verbose_info() {
        println!("{}",line);
    }
    Ok(())
}

pub fn menu(cmd: &clap::ArgMatches) -> STDRESULT {
    let collection = super::get_collection(cmd)?;
    for c in collection.iter_containers() {
        println!("{} {}",c.pathname,c.uuid);
        for top in &c.segments {
            println!("    {} {}",top.name,top.uuid);
            for (seg,level) in top.iter_menu(2) {
                println!("{}{} {}","    ".repeat(level),seg.name,seg.uuid);
            }
        }
    }
    if let Some(path) = cmd.get_one::<String>("session") {
        let s = match cmd.get_one::<u16>("indent") {
            Some(spaces) => json::stringify_pretty(collection.serialize_session(),*spaces),
            None => json::stringify(collection.serialize_session())
        };
        std::fs::write(path,s)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::sector_map_lines;

    #[test]
    fn map_rows() {
        let mut map = vec![true;70];
        map[0] = false;
        map[65] = false;
        let lines = sector_map_lines(&map,64);
        assert_eq!(lines.len(),2);
        assert!(lines[0].starts_with("0000: X."));
        assert_eq!(lines[1],"0064: .X....");
    }
}
