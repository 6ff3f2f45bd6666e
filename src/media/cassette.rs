//! Atari cassette (.cas) images.
//! The image is a sequence of chunks, each an 8 byte header followed by `length` bytes.

use std::io::Cursor;
use binrw::BinRead;
use super::Error;

pub const CHUNK_HEADER_LEN: usize = 8;

#[derive(BinRead,Debug,Clone)]
#[br(little)]
struct ChunkHeader {
    tag: [u8;4],
    length: u16,
    aux: u16
}

/// One chunk, offsets are buffer offsets
#[derive(Debug,Clone)]
pub struct Chunk {
    pub tag: String,
    pub length: usize,
    pub aux: u16,
    pub start: usize,
    pub data_start: usize
}

impl Chunk {
    /// Header plus data
    pub fn record_length(&self) -> usize {
        CHUNK_HEADER_LEN + self.length
    }
    pub fn data<'a>(&self,dat: &'a [u8]) -> &'a [u8] {
        &dat[self.data_start..self.data_start+self.length]
    }
}

impl std::fmt::Display for Chunk {
    fn fmt(&self,f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f,"{} @ {}: length={} aux={}",self.tag,self.start,self.length,self.aux)
    }
}

#[derive(Debug,Clone)]
pub struct Cassette {
    pub container: usize,
    pub buf_len: usize
}

impl Cassette {
    pub fn probe(container: usize,dat: &[u8]) -> Result<Self,Error> {
        if !dat.starts_with(b"FUJI") {
            return Err(Error::InvalidHeader("cassette image must start with FUJI chunk".to_string()));
        }
        let ans = Self { container, buf_len: dat.len() };
        ans.get_chunk(dat,0)?;
        Ok(ans)
    }
    /// Parse the chunk starting at `offset`.  Running off the end of the image is `InvalidSectorNumber`.
    pub fn get_chunk(&self,dat: &[u8],offset: usize) -> Result<Chunk,Error> {
        if offset + CHUNK_HEADER_LEN > dat.len() {
            return Err(Error::InvalidSectorNumber(offset));
        }
        let h = match ChunkHeader::read(&mut Cursor::new(&dat[offset..offset+CHUNK_HEADER_LEN])) {
            Ok(h) => h,
            Err(_) => return Err(Error::InvalidSectorNumber(offset))
        };
        let chunk = Chunk {
            tag: String::from_utf8_lossy(&h.tag).to_string(),
            length: h.length as usize,
            aux: h.aux,
            start: offset,
            data_start: offset + CHUNK_HEADER_LEN
        };
        if chunk.data_start + chunk.length > dat.len() {
            return Err(Error::InvalidMediaSize(format!("chunk {} runs past end of image",chunk)));
        }
        Ok(chunk)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn chunks() {
        let mut dat = b"FUJI".to_vec();
        dat.extend([3,0,0,0]);
        dat.extend(b"abc");
        dat.extend(b"baud");
        dat.extend([0,0,0x58,0x02]);
        let cas = Cassette::probe(0,&dat).expect("probe failed");
        let c = cas.get_chunk(&dat,0).unwrap();
        assert_eq!(c.data(&dat),b"abc");
        let c = cas.get_chunk(&dat,c.record_length()).unwrap();
        assert_eq!(c.tag,"baud");
        assert_eq!(c.aux,600);
        assert!(cas.get_chunk(&dat,dat.len()).is_err());
    }
}
