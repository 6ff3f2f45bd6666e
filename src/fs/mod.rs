//! # File System Module
//!
//! File system modules interpret a media's sectors or chunks as boot records, a VTOC,
//! and a directory of files.  There is a sub-module for each supported file system.
//!
//! File systems are represented by the `Filesystem` trait.  A filesystem is parsed from a
//! `Media` and the container's `Buffer`; it keeps only buffer offsets, so the segments it
//! produces are views into the buffer.  Operations that modify the disk write through the
//! buffer, after which the owner is expected to probe the filesystem again.
//!
//! Detection is a cascade over `REGISTRY`, the first filesystem that accepts the media wins.
//! If none does, the media has no filesystem and its bytes are handed to the file type probers.

pub mod dos2;
pub mod dos33;
pub mod kboot;
pub mod cassette;

use std::fmt;
use log::{debug,info};
use crate::buffer::Buffer;
use crate::media::{self,Media};
use crate::segment::{Segment,SegmentKind};
use crate::file_types::{self,FileHint};

/// Enumerates file system errors.  The `Display` trait will print equivalent long message.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("file system not compatible with media: {0}")]
    IncompatibleMedia(String),
    #[error("invalid directory entry: {0}")]
    InvalidDirent(String),
    #[error("no more directory entries")]
    LastDirent,
    #[error("no space in directory")]
    NoSpaceInDirectory,
    #[error("not enough space on disk: {0}")]
    NotEnoughSpaceOnDisk(String),
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("{0} does not support this operation")]
    Unsupported(String),
    #[error(transparent)]
    Media(#[from] media::Error),
    #[error(transparent)]
    File(#[from] FileError)
}

/// Errors found while following a file's data.  These mark the dirent as not sane.
#[derive(thiserror::Error,Debug)]
pub enum FileError {
    #[error("file structure error: {0}")]
    FileStructure(String),
    #[error("file number mismatch (164): {0}")]
    FileNumberMismatch164(String),
    #[error("byte not in file (166): {0}")]
    ByteNotInFile166(String),
    #[error("invalid binary file: {0}")]
    InvalidBinaryFile(String)
}

/// Filesystem specific part of a directory entry
#[derive(Debug,Clone,PartialEq)]
pub enum DirentMeta {
    AtariDos2 { flag: u8 },
    AppleDos33 { track: u8, sector: u8, file_type: u8, locked: bool, deleted: bool },
    KBoot { exe_size: usize },
    Cassette { baud: u16, num_chunks: usize, start_index: usize, bytes_on_tape: usize }
}

/// A directory entry.  Offsets in `entry`, `ts_list`, and `file` are buffer offsets.
#[derive(Debug,Clone)]
pub struct Dirent {
    pub file_num: usize,
    pub in_use: bool,
    pub is_sane: bool,
    pub basename: String,
    pub ext: String,
    pub num_sectors: usize,
    pub starting_sector: usize,
    pub error: Option<String>,
    pub meta: DirentMeta,
    pub hint: FileHint,
    /// bytes of the raw directory entry
    pub entry: Vec<usize>,
    pub ts_list: Vec<usize>,
    /// bytes of the file, in order
    pub file: Vec<usize>,
    /// sectors holding file data, in order
    pub sectors: Vec<usize>
}

impl Dirent {
    pub fn new(file_num: usize,meta: DirentMeta,entry: Vec<usize>) -> Self {
        Self {
            file_num,
            in_use: true,
            is_sane: true,
            basename: String::new(),
            ext: String::new(),
            num_sectors: 0,
            starting_sector: 0,
            error: None,
            meta,
            hint: FileHint::Plain,
            entry,
            ts_list: Vec::new(),
            file: Vec::new(),
            sectors: Vec::new()
        }
    }
    /// Mark the dirent as unusable, keeping it listable
    pub fn mark_insane(&mut self,err: &str) {
        debug!("dirent {}: {}",self.file_num,err);
        self.in_use = false;
        self.is_sane = false;
        self.error = Some(err.to_string());
        self.file = Vec::new();
        self.ts_list = Vec::new();
    }
    pub fn filename(&self) -> String {
        match self.ext.len() {
            0 => self.basename.clone(),
            _ => format!("{}.{}",self.basename,self.ext)
        }
    }
    pub fn matches(&self,name: &str,match_case: bool) -> bool {
        match match_case {
            true => self.filename()==name,
            false => self.filename().to_lowercase()==name.to_lowercase()
        }
    }
    pub fn status(&self) -> String {
        match &self.meta {
            DirentMeta::AtariDos2 { flag } => dos2::status_flags(*flag),
            DirentMeta::AppleDos33 { file_type, locked, deleted, .. } => {
                let mark = match (deleted,locked) { (true,_) => "D", (false,true) => "*", _ => " " };
                format!("{}{}",mark,dos33::type_letter(*file_type))
            },
            DirentMeta::KBoot { .. } => String::new(),
            DirentMeta::Cassette { baud, .. } => format!("{} baud",baud)
        }
    }
    pub fn catalog_entry(&self) -> String {
        match &self.meta {
            DirentMeta::AtariDos2 { .. } | DirentMeta::KBoot { .. } => {
                format!("{:03} {:<8}{:<3}  {:03}",self.starting_sector,self.basename,self.ext,self.num_sectors)
            },
            DirentMeta::AppleDos33 { .. } => format!("{} {:03} {}",self.status(),self.num_sectors,self.basename),
            DirentMeta::Cassette { start_index, num_chunks, .. } => format!("{} {}  {:03}",start_index,self.filename(),num_chunks)
        }
    }
    /// File contents
    pub fn read(&self,buf: &Buffer) -> Vec<u8> {
        self.file.iter().filter_map(|i| buf.data.get(*i).copied()).collect()
    }
    /// Dirent segment, with track/sector list and typed file as children
    pub fn segment(&self,container: usize,buf: &Buffer) -> Segment {
        let mut seg = Segment::from_indexes(container,buf.len(),&self.entry,0,&self.filename())
            .with_kind(SegmentKind::Dirent)
            .with_error(self.error.clone());
        if !self.ts_list.is_empty() {
            seg.segments.push(Segment::from_indexes(container,buf.len(),&self.ts_list,0,"Track/Sector List").with_kind(SegmentKind::TrackSectorList));
        }
        if self.is_sane && self.in_use && !self.file.is_empty() {
            let file = Segment::from_indexes(container,buf.len(),&self.file,0,&self.filename()).with_kind(SegmentKind::File);
            seg.segments.push(file_types::guess_file_type(buf,file,self.hint));
        }
        seg
    }
}

impl fmt::Display for Dirent {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status();
        match status.len() {
            0 => write!(f,"File #{:<2} {}",self.file_num,self.catalog_entry()),
            _ => write!(f,"File #{:<2} ({}) {}",self.file_num,status,self.catalog_entry())
        }
    }
}

#[derive(Debug,Clone)]
pub struct Directory {
    pub name: String,
    pub idx: Vec<usize>,
    pub dirents: Vec<Dirent>
}

impl Directory {
    pub fn segment(&self,container: usize,buf: &Buffer) -> Segment {
        let mut seg = Segment::from_indexes(container,buf.len(),&self.idx,0,&self.name).with_kind(SegmentKind::Directory);
        seg.segments = self.dirents.iter().map(|d| d.segment(container,buf)).collect();
        seg
    }
    pub fn find(&self,name: &str,match_case: bool) -> Option<&Dirent> {
        self.dirents.iter().find(|d| d.in_use && d.matches(name,match_case))
    }
}

/// Abstract file system interface.  Implementations hold offsets into the container's buffer.
pub trait Filesystem {
    fn ui_name(&self) -> &'static str;
    /// Boot, VTOC, and directory segments, whichever exist, in that order
    fn segments(&self,buf: &Buffer) -> Vec<Segment>;
    fn directory(&self) -> Option<&Directory>;
    /// One line per file, like the DOS directory listing
    fn catalog(&self) -> Vec<String> {
        self.dirents().iter().map(|d| d.to_string()).collect()
    }
    /// (buffer offset,comment) pairs describing the file system structures
    fn comments(&self) -> Vec<(usize,String)> {
        Vec::new()
    }
    /// Decoded VTOC fields as display lines
    fn vtoc_info(&self) -> Vec<String> {
        Vec::new()
    }
    fn num_free_sectors(&self) -> Option<usize> {
        None
    }
    /// Free flag for each sector, indexed by sector number
    fn free_sector_map(&self) -> Option<Vec<bool>> {
        None
    }
    /// Write a file through the buffer, the filesystem must be probed again afterwards
    fn write_file(&self,_buf: &mut Buffer,_filename: &str,_dat: &[u8]) -> Result<(),Error> {
        Err(Error::Unsupported(self.ui_name().to_string()))
    }
    /// Delete a file through the buffer, the filesystem must be probed again afterwards
    fn delete_file(&self,_buf: &mut Buffer,_filename: &str) -> Result<(),Error> {
        Err(Error::Unsupported(self.ui_name().to_string()))
    }
    fn dirents(&self) -> &[Dirent] {
        match self.directory() {
            Some(d) => &d.dirents,
            None => &[]
        }
    }
    fn find_dirent(&self,name: &str,match_case: bool) -> Option<&Dirent> {
        self.directory().and_then(|d| d.find(name,match_case))
    }
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum FilesystemProbe {
    AtariDos2,
    KBoot,
    AppleDos33,
    AtariCassette
}

pub const REGISTRY: [FilesystemProbe;4] = [
    FilesystemProbe::AtariDos2,
    FilesystemProbe::KBoot,
    FilesystemProbe::AppleDos33,
    FilesystemProbe::AtariCassette
];

impl FilesystemProbe {
    pub fn ui_name(&self) -> &'static str {
        match self {
            Self::AtariDos2 => dos2::UI_NAME,
            Self::KBoot => kboot::UI_NAME,
            Self::AppleDos33 => dos33::UI_NAME,
            Self::AtariCassette => cassette::UI_NAME
        }
    }
    /// `basename` names synthesized dirents, e.g. the KBoot executable
    pub fn try_filesystem(&self,media: &Media,buf: &Buffer,basename: &str) -> Result<Box<dyn Filesystem>,Error> {
        Ok(match self {
            Self::AtariDos2 => Box::new(dos2::AtariDos2::probe(media,buf)?),
            Self::KBoot => Box::new(kboot::KBoot::probe(media,buf,basename)?),
            Self::AppleDos33 => Box::new(dos33::AppleDos33::probe(media,buf)?),
            Self::AtariCassette => Box::new(cassette::AtariCassette::probe(media,buf)?)
        })
    }
}

/// Run the probe cascade; `None` means the media has no recognized filesystem
pub fn guess_filesystem(media: &Media,buf: &Buffer,basename: &str) -> Option<Box<dyn Filesystem>> {
    for probe in REGISTRY {
        debug!("trying filesystem {}",probe.ui_name());
        match probe.try_filesystem(media,buf,basename) {
            Ok(fs) => {
                info!("identified filesystem {}",fs.ui_name());
                return Some(fs);
            },
            Err(e) => debug!("{}: {}",probe.ui_name(),e)
        }
    }
    info!("no recognized filesystem");
    None
}

/// Split `NAME.EXT` into upper case parts that fit the limits
pub fn split_filename(filename: &str,max_base: usize,max_ext: usize) -> Result<(String,String),Error> {
    let (base,ext) = match filename.split_once('.') {
        Some((b,e)) => (b,e),
        None => (filename,"")
    };
    if base.is_empty() || base.len() > max_base || ext.len() > max_ext || !filename.is_ascii() {
        return Err(Error::InvalidDirent(format!("bad filename {}",filename)));
    }
    Ok((base.to_uppercase(),ext.to_uppercase()))
}
