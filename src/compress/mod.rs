//! # Compressor module
//!
//! Disk images are often stored inside one or more layers of compression.
//! Each layer is identified by a `Compressor`, which is a stateless decoder/encoder pair.
//! Detection is a probe cascade: every compressor in `REGISTRY` checks the data's
//! signature, the first one that succeeds (and actually changes the data) wins, and
//! detection repeats on the result.
//!
//! A chain is always stored innermost first, so `gzip(dcm(x))` is `[Dcm,Gzip]`.
//! Decompression undoes the chain back to front, `compress_in_reverse_order` redoes it
//! front to back.

pub mod dcm;
mod lzw;

use std::fmt;
use std::io::{Read,Write};
use std::str::FromStr;
use log::{debug,info};
use crate::media;

#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("data is not in this format: {0}")]
    InvalidAlgorithm(String),
    #[error("format recognized but not supported: {0}")]
    UnsupportedAlgorithm(String),
    #[error("media error: {0}")]
    Media(#[from] media::Error)
}

#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash)]
pub enum Compressor {
    None,
    Gzip,
    Bzip2,
    Xz,
    Lz4,
    Zlib,
    Lzw,
    Dcm
}

/// Probe order for detection
pub const REGISTRY: [Compressor;7] = [
    Compressor::Gzip,
    Compressor::Bzip2,
    Compressor::Xz,
    Compressor::Lz4,
    Compressor::Zlib,
    Compressor::Lzw,
    Compressor::Dcm
];

impl fmt::Display for Compressor {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{}",self.name())
    }
}

impl FromStr for Compressor {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "gzip" => Ok(Self::Gzip),
            "bzip2" => Ok(Self::Bzip2),
            "lzma" | "xz" => Ok(Self::Xz),
            "lz4" => Ok(Self::Lz4),
            "zlib" => Ok(Self::Zlib),
            "lzw" => Ok(Self::Lzw),
            "dcm" => Ok(Self::Dcm),
            _ => Err(Error::InvalidAlgorithm(format!("unknown compressor {}",s)))
        }
    }
}

fn io_invalid(algorithm: &str,e: std::io::Error) -> Error {
    Error::InvalidAlgorithm(format!("{}: {}",algorithm,e))
}

impl Compressor {
    /// stable identity used in sessions
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "lzma",
            Self::Lz4 => "lz4",
            Self::Zlib => "zlib",
            Self::Lzw => "lzw",
            Self::Dcm => "dcm"
        }
    }
    pub fn is_compressed(&self) -> bool {
        *self != Self::None
    }
    /// Can this compressor produce output
    pub fn can_compress(&self) -> bool {
        *self != Self::Lzw
    }
    /// Does the data carry this compressor's signature
    fn has_magic(&self,dat: &[u8]) -> bool {
        match self {
            Self::None => true,
            Self::Gzip => dat.starts_with(&[0x1f,0x8b]),
            Self::Bzip2 => dat.starts_with(b"BZh"),
            Self::Xz => dat.starts_with(&[0xfd,0x37,0x7a,0x58,0x5a,0x00]),
            Self::Lz4 => dat.starts_with(&[0x04,0x22,0x4d,0x18]),
            Self::Zlib => dat.len() > 2 && dat[0] & 0x0f == 8 && dat[0] >> 4 <= 7 && (dat[0] as usize * 256 + dat[1] as usize) % 31 == 0,
            Self::Lzw => dat.starts_with(&[0x1f,0x9d]),
            Self::Dcm => dat.len() > 1 && (dat[0]==0xfa || dat[0]==0xf9)
        }
    }
    pub fn decompress(&self,dat: &[u8]) -> Result<Vec<u8>,Error> {
        if !self.has_magic(dat) {
            return Err(Error::InvalidAlgorithm(format!("no {} signature",self.name())));
        }
        let mut ans = Vec::new();
        match self {
            Self::None => ans = dat.to_vec(),
            Self::Gzip => {
                flate2::read::GzDecoder::new(dat).read_to_end(&mut ans).map_err(|e| io_invalid("gzip",e))?;
            },
            Self::Zlib => {
                flate2::read::ZlibDecoder::new(dat).read_to_end(&mut ans).map_err(|e| io_invalid("zlib",e))?;
            },
            Self::Bzip2 => {
                bzip2::read::BzDecoder::new(dat).read_to_end(&mut ans).map_err(|e| io_invalid("bzip2",e))?;
            },
            Self::Xz => {
                let mut rdr = std::io::Cursor::new(dat);
                if let Err(e) = lzma_rs::xz_decompress(&mut rdr,&mut ans) {
                    return Err(Error::InvalidAlgorithm(format!("lzma: {}",e)));
                }
            },
            Self::Lz4 => {
                lz4_flex::frame::FrameDecoder::new(dat).read_to_end(&mut ans).map_err(|e| io_invalid("lz4",e))?;
            },
            Self::Lzw => ans = lzw::decompress(dat)?,
            Self::Dcm => ans = dcm::decompress(dat)?
        }
        Ok(ans)
    }
    /// Compress the data.  DCM requires the disk layout of the data.
    pub fn compress(&self,dat: &[u8],disk: Option<&media::Disk>) -> Result<Vec<u8>,Error> {
        let unsupported = |e: std::io::Error| Error::UnsupportedAlgorithm(format!("{}: {}",self.name(),e));
        match self {
            Self::None => Ok(dat.to_vec()),
            Self::Gzip => {
                let mut enc = flate2::write::GzEncoder::new(Vec::new(),flate2::Compression::default());
                enc.write_all(dat).map_err(unsupported)?;
                enc.finish().map_err(unsupported)
            },
            Self::Zlib => {
                let mut enc = flate2::write::ZlibEncoder::new(Vec::new(),flate2::Compression::default());
                enc.write_all(dat).map_err(unsupported)?;
                enc.finish().map_err(unsupported)
            },
            Self::Bzip2 => {
                let mut enc = bzip2::write::BzEncoder::new(Vec::new(),bzip2::Compression::best());
                enc.write_all(dat).map_err(unsupported)?;
                enc.finish().map_err(unsupported)
            },
            Self::Xz => {
                let mut ans = Vec::new();
                lzma_rs::xz_compress(&mut std::io::Cursor::new(dat),&mut ans).map_err(unsupported)?;
                Ok(ans)
            },
            Self::Lz4 => {
                let mut enc = lz4_flex::frame::FrameEncoder::new(Vec::new());
                enc.write_all(dat).map_err(unsupported)?;
                enc.finish().map_err(|e| Error::UnsupportedAlgorithm(format!("lz4: {}",e)))
            },
            Self::Lzw => Err(Error::UnsupportedAlgorithm("lzw compression is not implemented".to_string())),
            Self::Dcm => match disk {
                Some(d) => dcm::compress(dat,d,None),
                None => Err(Error::Media(media::Error::InvalidMediaSize("DCM Compressor only works with disk images".to_string())))
            }
        }
    }
}

/// Peel off compression layers until no compressor recognizes the data.
/// Returns the innermost data and the chain, innermost first.  Uncompressed data
/// gives `[None]`.  An `UnsupportedAlgorithm` error ends the search immediately.
pub fn guess_compressor_chain(dat: &[u8]) -> Result<(Vec<u8>,Vec<Compressor>),Error> {
    let mut current = dat.to_vec();
    let mut outer_first: Vec<Compressor> = Vec::new();
    'layers: loop {
        for c in REGISTRY {
            debug!("trying compressor {}",c);
            match c.decompress(&current) {
                Ok(unpacked) => {
                    if unpacked==current {
                        debug!("{} did not change the data",c);
                        continue;
                    }
                    info!("found compressor {}",c);
                    outer_first.push(c);
                    current = unpacked;
                    continue 'layers;
                },
                Err(Error::InvalidAlgorithm(msg)) => debug!("{}",msg),
                Err(e) => return Err(e)
            }
        }
        break;
    }
    if outer_first.len()==0 {
        info!("image does not appear to be compressed.");
        return Ok((current,vec![Compressor::None]));
    }
    outer_first.reverse();
    Ok((current,outer_first))
}

/// Undo a chain produced by `guess_compressor_chain`
pub fn decompress_chain(dat: &[u8],chain: &[Compressor]) -> Result<Vec<u8>,Error> {
    let mut current = dat.to_vec();
    for c in chain.iter().rev() {
        current = c.decompress(&current)?;
    }
    Ok(current)
}

/// Re-apply a chain, innermost first.  If `skip_missing` is set, compressors that
/// cannot encode are bypassed rather than failing.
pub fn compress_in_reverse_order(dat: &[u8],chain: &[Compressor],disk: Option<&media::Disk>,skip_missing: bool) -> Result<Vec<u8>,Error> {
    let mut current = dat.to_vec();
    for (i,c) in chain.iter().enumerate() {
        if skip_missing && !c.can_compress() {
            info!("skipping {} which cannot compress",c);
            continue;
        }
        // only the innermost layer sees the disk layout
        let layout = match i {
            0 => disk,
            _ => None
        };
        current = c.compress(&current,layout)?;
    }
    Ok(current)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_data_is_not_compressed() {
        let dat: Vec<u8> = (0..1000).map(|i| (i % 251) as u8).collect();
        let (inner,chain) = guess_compressor_chain(&dat).expect("guess failed");
        assert_eq!(inner,dat);
        assert_eq!(chain,vec![Compressor::None]);
    }

    #[test]
    fn stream_codecs() {
        let dat: Vec<u8> = b"the quick brown fox jumps over the lazy dog ".repeat(40);
        for c in [Compressor::Gzip,Compressor::Bzip2,Compressor::Xz,Compressor::Lz4,Compressor::Zlib] {
            let packed = c.compress(&dat,None).expect("compress failed");
            let (inner,chain) = guess_compressor_chain(&packed).expect("guess failed");
            assert_eq!(chain,vec![c]);
            assert_eq!(inner,dat);
        }
    }

    #[test]
    fn nested_chain() {
        let dat: Vec<u8> = b"layered data ".repeat(100);
        let chain = vec![Compressor::Bzip2,Compressor::Gzip];
        let packed = compress_in_reverse_order(&dat,&chain,None,false).expect("compress failed");
        let (inner,found) = guess_compressor_chain(&packed).expect("guess failed");
        assert_eq!(found,chain);
        assert_eq!(inner,dat);
        assert_eq!(decompress_chain(&packed,&found).expect("decompress failed"),dat);
    }

    #[test]
    fn lzw_cannot_compress() {
        assert!(matches!(Compressor::Lzw.compress(&[1,2,3],None),Err(Error::UnsupportedAlgorithm(_))));
        let out = compress_in_reverse_order(&[1,2,3],&[Compressor::Lzw],None,true).expect("skip failed");
        assert_eq!(out,vec![1,2,3]);
    }
}
