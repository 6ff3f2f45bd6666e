//! # DOS 3.3 disk structures
//! Fixed length structures read and written with binrw.

// Note on large volumes:
// The bitmap has room for 50 tracks of 32 sectors, we only map the first 16 sectors of each track.

use std::io::Cursor;
use binrw::{BinRead,BinWrite};
use bit_vec::BitVec;
use num_derive::FromPrimitive;
use super::super::Error;

pub const VTOC_TRACK: usize = 17;
pub const TRACKS: u8 = 35;
pub const SECTORS: u8 = 16;
pub const SECTOR_BYTES: u16 = 256;
pub const BITMAP_TRACKS: usize = 50;
/// offset and length of the dirents in each catalog sector
pub const CATALOG_PAYLOAD: (usize,usize) = (0x0b,245);
/// offset and length of the track/sector pairs in each T/S list sector
pub const TSLIST_PAYLOAD: (usize,usize) = (0x0c,244);
pub const DIRENT_SIZE: usize = 35;

/// File types, the locked flag (bit 7) is stripped first.
#[derive(FromPrimitive,Debug,Clone,Copy,PartialEq,Eq)]
pub enum FileType {
    Text = 0x00,
    Integer = 0x01,
    Applesoft = 0x02,
    Binary = 0x04,
    SType = 0x08,
    Relocatable = 0x10,
    AType = 0x20,
    BType = 0x40
}

impl FileType {
    pub fn letter(&self) -> char {
        match self {
            Self::Text => 'T',
            Self::Integer => 'I',
            Self::Applesoft => 'A',
            Self::Binary => 'B',
            Self::SType => 'S',
            Self::Relocatable => 'R',
            Self::AType => 'a',
            Self::BType => 'b'
        }
    }
}

#[derive(BinRead,BinWrite,Debug,Clone)]
#[brw(little)]
pub struct VtocRecord {
    pub pad1: u8,
    pub track1: u8,
    pub sector1: u8,
    pub version: u8,
    pub pad2: [u8;2],
    pub vol: u8,
    pub pad3: [u8;32],
    pub max_pairs: u8,
    pub pad4: [u8;8],
    pub last_track: u8,
    pub last_direction: u8,
    pub pad5: [u8;2],
    pub tracks: u8,
    pub sectors: u8,
    pub bytes: u16,
    pub bitmap: [u8;200]
}

impl VtocRecord {
    pub fn from_bytes(dat: &[u8]) -> Result<Self,Error> {
        Self::read(&mut Cursor::new(dat)).map_err(|e| Error::IncompatibleMedia(format!("bad VTOC: {}",e)))
    }
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut curs = Cursor::new(Vec::new());
        let _ = self.write(&mut curs);
        curs.into_inner()
    }
    /// Geometry checks for a 16 sector floppy
    pub fn verify(&self) -> Result<(),Error> {
        if self.tracks != TRACKS || self.sectors != SECTORS || self.bytes != SECTOR_BYTES {
            return Err(Error::IncompatibleMedia(format!("VTOC geometry {}x{}x{}",self.tracks,self.sectors,self.bytes)));
        }
        if self.vol < 1 || self.vol > 254 {
            return Err(Error::IncompatibleMedia(format!("volume {} out of range",self.vol)));
        }
        if self.track1 >= self.tracks {
            return Err(Error::IncompatibleMedia(format!("catalog track {} out of range",self.track1)));
        }
        Ok(())
    }
    /// Free sector map indexed by `track*16+sector`, `true` is free.
    /// On disk each track has 4 bytes, the first two hold sectors 15 down to 0.
    pub fn unpack_bitmap(&self) -> BitVec {
        let bits = BitVec::from_bytes(&self.bitmap);
        let mut map = BitVec::from_elem(BITMAP_TRACKS*16,false);
        for t in 0..BITMAP_TRACKS {
            for s in 0..16 {
                map.set(t*16+s,bits[t*32+15-s]);
            }
        }
        map
    }
    pub fn pack_bitmap(&mut self,map: &BitVec) {
        let mut bits = BitVec::from_bytes(&self.bitmap);
        for t in 0..BITMAP_TRACKS {
            for s in 0..16 {
                bits.set(t*32+15-s,map.get(t*16+s).unwrap_or(false));
            }
        }
        self.bitmap.copy_from_slice(&bits.to_bytes());
    }
}

#[derive(BinRead,BinWrite,Debug,Clone)]
#[brw(little)]
pub struct DirectoryEntry {
    pub tsl_track: u8,
    pub tsl_sector: u8,
    pub file_type: u8,
    pub name: [u8;30],
    pub sectors: u16
}

impl DirectoryEntry {
    pub fn from_bytes(dat: &[u8]) -> Result<Self,Error> {
        Self::read(&mut Cursor::new(dat)).map_err(|e| Error::InvalidDirent(e.to_string()))
    }
    /// Name with the high bit stripped and trailing spaces removed.
    /// A deleted entry keeps its track in the last name byte.
    pub fn name(&self) -> String {
        let len = match self.is_deleted() { true => 29, false => 30 };
        self.name[0..len].iter().map(|b| (b & 0x7f) as char).collect::<String>().trim_end().to_string()
    }
    /// Track of the T/S list, recovered from byte 32 when the entry is deleted
    pub fn real_track(&self) -> u8 {
        match self.is_deleted() {
            true => self.name[29],
            false => self.tsl_track
        }
    }
    pub fn is_deleted(&self) -> bool {
        self.tsl_track==0xff
    }
    pub fn is_never_used(&self) -> bool {
        self.tsl_track==0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bitmap_permutation() {
        let mut dat = vec![0;256];
        dat[0x34] = 35;
        dat[0x35] = 16;
        dat[0x37] = 1;
        dat[0x06] = 254;
        dat[0x01] = 17;
        // track 1: sectors 15..8 free, sector 0 free
        dat[0x38+4] = 0xff;
        dat[0x38+5] = 0x01;
        let mut vtoc = VtocRecord::from_bytes(&dat).expect("bad vtoc");
        assert!(vtoc.verify().is_ok());
        let map = vtoc.unpack_bitmap();
        assert!(map[16]);
        assert!(!map[17]);
        assert!(map[31]);
        assert_eq!(map.iter().filter(|b| *b).count(),9);
        vtoc.pack_bitmap(&map);
        assert_eq!(vtoc.to_bytes(),dat);
    }
}
