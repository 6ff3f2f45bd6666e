//! # Atari cassette file system
//!
//! Each file on tape starts with a `FUJI` chunk holding its name, followed by `baud` and
//! `data` chunks.  Data chunks hold one 132 byte tape record: 2 sync bytes, a control byte,
//! 128 data bytes and a checksum.  Control byte `FC` is a full record, `FA` a partial
//! record with the count in the last data byte, and `FE` the end of file.

use log::{debug,warn};
use super::{Error,FileError,Dirent,DirentMeta,Directory,Filesystem};
use crate::buffer::Buffer;
use crate::file_types::FileHint;
use crate::media::{self,Media,Cassette};
use crate::segment::Segment;

pub const UI_NAME: &str = "Atari Cassette (.cas)";
const DEFAULT_BAUD: u16 = 600;
const RECORD_DATA_OFFSET: usize = 3;
const RECORD_DATA_LEN: usize = 128;
const FULL_RECORD: u8 = 0xfc;
const PARTIAL_RECORD: u8 = 0xfa;
const EOF_RECORD: u8 = 0xfe;

pub struct AtariCassette {
    container: usize,
    directory: Directory
}

/// Parse one file starting at the `FUJI` chunk at `start`
fn parse_file(cas: &Cassette,dat: &[u8],file_num: usize,start: usize) -> Result<Dirent,Error> {
    let fuji = cas.get_chunk(dat,start)?;
    if fuji.tag != "FUJI" {
        return Err(Error::File(FileError::FileStructure(format!("expecting FUJI chunk to begin file, found {}",fuji.tag))));
    }
    let name = String::from_utf8_lossy(fuji.data(dat)).trim().to_string();
    let mut baud = DEFAULT_BAUD;
    let mut num_chunks = 0;
    let mut file = Vec::new();
    let mut index = start + fuji.record_length();
    loop {
        let chunk = match cas.get_chunk(dat,index) {
            Ok(c) => c,
            Err(media::Error::InvalidSectorNumber(_)) => {
                warn!("{}: tape ends without EOF record",name);
                break;
            },
            Err(e) => return Err(Error::Media(e))
        };
        debug!("reading chunk {}",chunk);
        match chunk.tag.as_str() {
            "FUJI" => {
                warn!("{}: missing EOF record, assuming end of file",name);
                break;
            },
            "baud" => baud = chunk.aux,
            "data" => {
                num_chunks += 1;
                let rec = chunk.data(dat);
                let flag = rec.get(2).copied().unwrap_or(0);
                let begin = chunk.data_start + RECORD_DATA_OFFSET;
                let avail = chunk.length.saturating_sub(RECORD_DATA_OFFSET + 1);
                match flag {
                    FULL_RECORD => file.extend(begin..begin+usize::min(avail,RECORD_DATA_LEN)),
                    PARTIAL_RECORD => {
                        let count = rec.get(RECORD_DATA_OFFSET + RECORD_DATA_LEN - 1).copied().unwrap_or(0) as usize;
                        file.extend(begin..begin+usize::min(count,avail));
                    },
                    EOF_RECORD => {
                        index += chunk.record_length();
                        break;
                    },
                    _ => return Err(Error::File(FileError::FileStructure(format!("unknown data record flag {:02x}",flag))))
                }
            },
            _ => debug!("skipping {} chunk",chunk.tag)
        }
        index += chunk.record_length();
    }
    let meta = DirentMeta::Cassette { baud, num_chunks, start_index: start, bytes_on_tape: index - start };
    let mut ans = Dirent::new(file_num,meta,(start..fuji.data_start+fuji.length).collect());
    ans.basename = name;
    ans.num_sectors = num_chunks;
    ans.hint = FileHint::Atari;
    ans.file = file;
    Ok(ans)
}

impl AtariCassette {
    pub fn probe(media: &Media,buf: &Buffer) -> Result<Self,Error> {
        let cas = match media.cassette() {
            Some(c) => c,
            None => return Err(Error::IncompatibleMedia(format!("{} only valid on cassette media",UI_NAME)))
        };
        let mut dirents: Vec<Dirent> = Vec::new();
        let mut start = 0;
        while start < buf.len() {
            match parse_file(cas,&buf.data,dirents.len(),start) {
                Ok(d) => {
                    let bytes_on_tape = match d.meta {
                        DirentMeta::Cassette { bytes_on_tape, .. } => bytes_on_tape,
                        _ => 0
                    };
                    dirents.push(d);
                    if bytes_on_tape==0 {
                        break;
                    }
                    start += bytes_on_tape;
                },
                Err(e) => {
                    debug!("end of tape directory at {}: {}",start,e);
                    break;
                }
            }
        }
        Ok(Self {
            container: media.container,
            directory: Directory {
                name: "Tape Directory".to_string(),
                idx: Vec::new(),
                dirents
            }
        })
    }
}

impl Filesystem for AtariCassette {
    fn ui_name(&self) -> &'static str {
        UI_NAME
    }
    fn segments(&self,buf: &Buffer) -> Vec<Segment> {
        vec![self.directory.segment(self.container,buf)]
    }
    fn directory(&self) -> Option<&Directory> {
        Some(&self.directory)
    }
    fn comments(&self) -> Vec<(usize,String)> {
        self.directory.dirents.iter().filter_map(|d| d.entry.first().map(|i| (*i,format!("FILE #{}: FUJI chunk",d.file_num)))).collect()
    }
}
