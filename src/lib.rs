//! # `a8kit` main library
//!
//! This library reads, inspects, and modifies disk, cassette, and cartridge images for
//! vintage 8-bit computers, with emphasis on the Atari 8-bit line and the Apple II.
//!
//! ## Architecture
//!
//! Everything is loaded into a `collection::Collection`, which drives a detection cascade:
//! * `compress` peels off compression layers (gzip, bzip2, xz, lz4, unix compress, zlib, DCM)
//! * `archive` splits tar and zip archives into members
//! * `container::Container` holds one decompressed image in a `buffer::Buffer`
//! * `media` identifies the image as a disk, cassette, or cartridge
//! * `fs` imposes a file system on the media
//! * `file_types` types the files the file system finds
//!
//! The result is a forest of `segment::Segment` views.  A segment never copies bytes, it holds
//! an index array into its container's buffer, so nested, sparse, and reordered views all see
//! the same data, styles, and comments.  Saving runs the cascade in reverse.
//!
//! ## File Systems
//!
//! As of this writing `a8kit` supports
//! * Atari DOS 2 (SD, ED, DD), read and write
//! * Apple DOS 3.3, read only
//! * KBoot single executable disks
//! * Atari cassette files
//!
//! ## Media
//!
//! * ATR, XFD, and DCM Atari disks, including the DD short boot layout
//! * DSK/DO Apple 16 sector disks
//! * CAS Atari cassettes
//! * Atari 8-bit, 5200, 2600, and Vectrex cartridges

pub mod style_bits;
pub mod ranges;
pub mod buffer;
pub mod segment;
pub mod compress;
pub mod archive;
pub mod media;
pub mod fs;
pub mod file_types;
pub mod container;
pub mod collection;
pub mod commands;

use log::info;
use collection::Collection;

type DYNERR = Box<dyn std::error::Error>;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

pub const KNOWN_FILE_EXTENSIONS: &str = "atr,xfd,dcm,cas,car,rom,a52,bin,dsk,do,xex,zip,tar,gz,bz2,xz,lz4,z";

/// True if the path has an extension a8kit knows how to handle
pub fn is_known_extension(path: &str) -> bool {
    match std::path::Path::new(path).extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy().to_lowercase();
            KNOWN_FILE_EXTENSIONS.split(',').any(|x| x==ext)
        },
        None => false
    }
}

/// Read a file from the host and run the full detection cascade on it
pub fn load_collection(path: &str) -> Result<Collection,DYNERR> {
    let dat = std::fs::read(path)?;
    if !is_known_extension(path) {
        info!("unknown extension on {}, trying all formats",path);
    }
    Ok(Collection::new(path,&dat)?)
}

/// Read a file and apply a previously serialized session to it
pub fn load_session(path: &str,session_path: &str) -> Result<Collection,DYNERR> {
    let dat = std::fs::read(path)?;
    let session = json::parse(&std::fs::read_to_string(session_path)?)?;
    Ok(Collection::restore_session(path,&dat,&session)?)
}

/// Save the collection back to the host (make changes permanent)
pub fn save_collection(collection: &Collection,path: Option<&str>) -> STDRESULT {
    collection.save(path,false)?;
    Ok(())
}

/// Display binary to stdout in columns of hex and ascii
pub fn display_block(start_addr: usize,block: &[u8]) {
    for (row,slice) in block.chunks(16).enumerate() {
        let txt: String = slice.iter().map(|c| match *c {
            x if (32..127).contains(&x) => x as char,
            _ => '.'
        }).collect();
        print!("{:04X} : ",start_addr + row*16);
        for byte in slice {
            print!("{:02X} ",byte);
        }
        for _blank in slice.len()..16 {
            print!("   ");
        }
        println!("| {}",txt);
    }
}
