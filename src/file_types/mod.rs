//! # File types
//!
//! Probers that look inside a file's bytes and attach child segments describing its
//! structure, e.g. the load segments of an Atari executable.  A file that no prober
//! accepts is left as a plain `File` segment.

pub mod xex;
pub mod apple;

use log::{debug,warn};
use crate::buffer::Buffer;
use crate::segment::Segment;

/// What the filesystem knows about a file before it is probed
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum FileHint {
    Atari,
    AppleBinary,
    Plain
}

/// Attach structure to `file`.  A file that claims to be of a type but is damaged keeps
/// its bytes and gets an error string.
pub fn guess_file_type(buf: &Buffer,mut file: Segment,hint: FileHint) -> Segment {
    let result = match hint {
        FileHint::Atari | FileHint::Plain => xex::parse(buf,&file),
        FileHint::AppleBinary => apple::parse(buf,&file)
    };
    match result {
        Ok(Some(children)) => {
            debug!("{}: {} typed segments",file.name,children.len());
            file.segments = children;
        },
        Ok(None) => {},
        Err(e) => {
            warn!("{}: {}",file.name,e);
            file.error = Some(e.to_string());
        }
    }
    file
}

pub(crate) fn u16_at(dat: &[u8],pos: usize) -> Option<usize> {
    match dat.get(pos..pos+2) {
        Some(b) => Some(u16::from_le_bytes([b[0],b[1]]) as usize),
        None => None
    }
}
