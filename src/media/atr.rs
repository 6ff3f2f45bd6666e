//! ATR header, see the Atari800 and APE documentation.
//! The header is 16 bytes, little endian, and declares the image size in 16 byte paragraphs.

use std::io::Cursor;
use binrw::{BinRead,BinWrite};
use super::Error;

pub const ATR_HEADER_LEN: usize = 16;

#[derive(BinRead,BinWrite,Debug,Clone,PartialEq)]
#[brw(little, magic = 0x0296u16)]
pub struct AtrHeader {
    pub pars_lo: u16,
    pub sector_size: u16,
    pub pars_hi: u8,
    pub crc: u32,
    pub unused: u32,
    pub flags: u8
}

impl AtrHeader {
    pub fn new(image_size: usize,sector_size: usize) -> Self {
        let paragraphs = image_size / 16;
        Self {
            pars_lo: (paragraphs & 0xffff) as u16,
            sector_size: sector_size as u16,
            pars_hi: (paragraphs >> 16) as u8,
            crc: 0,
            unused: 0,
            flags: 0
        }
    }
    /// Parse the first 16 bytes, fails if too short or the magic is missing
    pub fn from_bytes(dat: &[u8]) -> Result<Self,Error> {
        if dat.len() < ATR_HEADER_LEN {
            return Err(Error::InvalidHeader(format!("file size {} too small for an ATR header",dat.len())));
        }
        match Self::read(&mut Cursor::new(&dat[0..ATR_HEADER_LEN])) {
            Ok(h) => Ok(h),
            Err(_) => Err(Error::InvalidHeader("no ATR header magic value".to_string()))
        }
    }
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut curs = Cursor::new(Vec::new());
        // writing fixed fields to memory cannot fail
        let _ = self.write(&mut curs);
        curs.into_inner()
    }
    /// Image size in bytes declared by the header, excluding the header
    pub fn image_size(&self) -> usize {
        ((self.pars_hi as usize) << 16 | self.pars_lo as usize) * 16
    }
    /// Verify the header is consistent with the probed media
    pub fn check_media(&self,sector_size: usize,payload_len: usize) -> Result<(),Error> {
        if self.sector_size as usize != sector_size {
            return Err(Error::InvalidMediaSize(format!("Sector size {} invalid, expected {}",self.sector_size,sector_size)));
        }
        if self.image_size() != payload_len {
            return Err(Error::InvalidMediaSize(format!("ATR header declares {} bytes, found {}",self.image_size(),payload_len)));
        }
        Ok(())
    }
}
