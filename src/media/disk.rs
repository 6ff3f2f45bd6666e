//! # Disk geometry
//!
//! Sector addressing for Atari and Apple disk images.  All offsets returned here are
//! offsets into the container's buffer, i.e., any header is already accounted for.
//! Atari sectors are numbered from 1, Apple sectors from 0 (track*16+sector).

use std::collections::HashSet;
use log::{debug,warn};
use crate::buffer::Buffer;
use crate::segment::Segment;
use super::Error;

pub const ATARI_SD_SIZE: usize = 92160;
pub const ATARI_ED_SIZE: usize = 133120;
pub const ATARI_DD_SIZE: usize = 184320;
pub const ATARI_DD_SHORT_BOOT_SIZE: usize = 183936;
pub const APPLE_16_SECTOR_SIZE: usize = 143360;
const SHORT_BOOT_SECTORS: usize = 3;
const SHORT_BOOT_SECTOR_SIZE: usize = 128;

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum DiskKind {
    AtariSD,
    AtariED,
    AtariDD,
    AtariDDShortBoot,
    AtariDDHardDrive,
    AtariSDShort,
    Apple16Sector
}

impl DiskKind {
    pub fn ui_name(&self) -> &'static str {
        match self {
            Self::AtariSD => "Atari SD (90K) Floppy Disk Image",
            Self::AtariED => "Atari ED (130K) Floppy Disk Image",
            Self::AtariDD => "Atari DD (180K) Floppy Disk Image",
            Self::AtariDDShortBoot => "Atari DD (180K) Floppy Disk Image (Short Boot Sectors)",
            Self::AtariDDHardDrive => "Atari DD Hard Drive Image",
            Self::AtariSDShort => "Atari SD Non-Standard Image",
            Self::Apple16Sector => "Apple ][ Floppy Disk Image (16 sector tracks)"
        }
    }
    pub fn sector_size(&self) -> usize {
        match self {
            Self::AtariSD | Self::AtariED | Self::AtariSDShort => 128,
            _ => 256
        }
    }
    pub fn starting_sector_label(&self) -> usize {
        match self {
            Self::Apple16Sector => 0,
            _ => 1
        }
    }
    pub fn is_atari(&self) -> bool {
        *self != Self::Apple16Sector
    }
    /// Number of sectors for a payload of this length, or an error if the length
    /// is impossible for this kind of disk.
    fn calc_num_sectors(&self,payload_len: usize) -> Result<usize,Error> {
        let size_err = |expected: &str| Err(Error::InvalidMediaSize(format!("{} expects size {}; found {}",self.ui_name(),expected,payload_len)));
        let exact = match self {
            Self::AtariSD => Some(ATARI_SD_SIZE),
            Self::AtariED => Some(ATARI_ED_SIZE),
            Self::AtariDD => Some(ATARI_DD_SIZE),
            Self::Apple16Sector => Some(APPLE_16_SECTOR_SIZE),
            _ => None
        };
        if let Some(expected) = exact {
            if payload_len != expected {
                return size_err(&expected.to_string());
            }
        }
        match self {
            Self::AtariDDShortBoot => {
                let initial = SHORT_BOOT_SECTORS * SHORT_BOOT_SECTOR_SIZE;
                if payload_len <= initial || (payload_len - initial) % 256 != 0 {
                    return size_err("3*128+k*256");
                }
                return Ok(SHORT_BOOT_SECTORS + (payload_len - initial) / 256);
            },
            Self::AtariDDHardDrive if payload_len <= ATARI_DD_SIZE => return size_err(&format!("> {}",ATARI_DD_SIZE)),
            Self::AtariSDShort if payload_len >= ATARI_SD_SIZE || payload_len==0 => return size_err(&format!("< {}",ATARI_SD_SIZE)),
            _ => {}
        }
        if payload_len % self.sector_size() != 0 {
            return Err(Error::InvalidMediaSize(format!("{} requires integer number of sectors",self.ui_name())));
        }
        Ok(payload_len / self.sector_size())
    }
}

#[derive(Debug,Clone)]
pub struct Disk {
    pub kind: DiskKind,
    pub container: usize,
    pub header_length: usize,
    pub sector_size: usize,
    pub num_sectors: usize,
    pub starting_sector_label: usize,
    pub sectors_per_track: usize,
    buf_len: usize
}

impl Disk {
    /// Disk whose payload starts after `header_length` bytes of a buffer of `buf_len` bytes
    pub fn from_layout(kind: DiskKind,container: usize,header_length: usize,buf_len: usize) -> Result<Self,Error> {
        if buf_len < header_length {
            return Err(Error::InvalidMediaSize("buffer smaller than header".to_string()));
        }
        let num_sectors = kind.calc_num_sectors(buf_len - header_length)?;
        Ok(Self {
            kind,
            container,
            header_length,
            sector_size: kind.sector_size(),
            num_sectors,
            starting_sector_label: kind.starting_sector_label(),
            sectors_per_track: match kind {
                DiskKind::Apple16Sector => 16,
                _ => 18
            },
            buf_len
        })
    }
    pub fn headerless(kind: DiskKind,container: usize,buf_len: usize) -> Result<Self,Error> {
        Self::from_layout(kind,container,0,buf_len)
    }
    pub fn buf_len(&self) -> usize {
        self.buf_len
    }
    pub fn payload_len(&self) -> usize {
        self.buf_len - self.header_length
    }
    pub fn ui_name(&self) -> &'static str {
        self.kind.ui_name()
    }
    pub fn is_sector_valid(&self,sector: usize) -> bool {
        sector >= self.starting_sector_label && sector < self.num_sectors + self.starting_sector_label
    }
    /// Buffer offset and size of the sector
    pub fn get_index_of_sector(&self,sector: usize) -> Result<(usize,usize),Error> {
        if !self.is_sector_valid(sector) {
            return Err(Error::InvalidSectorNumber(sector));
        }
        let (pos,size) = match self.kind {
            DiskKind::AtariDDShortBoot if sector <= SHORT_BOOT_SECTORS => {
                (SHORT_BOOT_SECTOR_SIZE * (sector - 1),SHORT_BOOT_SECTOR_SIZE)
            },
            DiskKind::AtariDDShortBoot => {
                (SHORT_BOOT_SECTORS * SHORT_BOOT_SECTOR_SIZE + (sector - 1 - SHORT_BOOT_SECTORS) * self.sector_size,self.sector_size)
            },
            _ => ((sector - self.starting_sector_label) * self.sector_size,self.sector_size)
        };
        Ok((self.header_length + pos,size))
    }
    /// Contiguous run of `count` sectors starting at `start`
    pub fn get_contiguous_sectors(&self,start: usize,count: usize,name: &str) -> Result<Segment,Error> {
        if count==0 {
            return Err(Error::InvalidSectorNumber(start));
        }
        let (index,_) = self.get_index_of_sector(start)?;
        let (last,size) = self.get_index_of_sector(start + count - 1)?;
        Ok(Segment::new(self.container,self.buf_len,index,last + size - index,0,name)
            .with_sectors(start,count,self.sector_size))
    }
    /// Buffer offsets of the listed sectors in order, each truncated to `size_override` if given
    pub fn get_sector_list_offsets(&self,sectors: &[usize],size_override: Option<usize>) -> Result<Vec<usize>,Error> {
        let mut ans = Vec::new();
        for s in sectors {
            let (index,size) = self.get_index_of_sector(*s)?;
            let size = match size_override {
                Some(max) => usize::min(size,max),
                None => size
            };
            ans.extend(index..index+size);
        }
        Ok(ans)
    }
    /// Stitch possibly non-contiguous sectors into one segment
    pub fn get_sector_list(&self,sectors: &[usize],size_override: Option<usize>,name: &str) -> Result<Segment,Error> {
        let offsets = self.get_sector_list_offsets(sectors,size_override)?;
        Ok(Segment::from_indexes(self.container,self.buf_len,&offsets,0,name))
    }
    /// (sector,offset,size) for every sector
    pub fn iter_sectors(&self) -> Vec<(usize,usize,usize)> {
        let mut ans = Vec::new();
        let mut s = self.starting_sector_label;
        while let Ok((pos,size)) = self.get_index_of_sector(s) {
            ans.push((s,pos,size));
            s += 1;
        }
        ans
    }
    pub fn read_sector(&self,buf: &Buffer,sector: usize) -> Result<Vec<u8>,Error> {
        let (pos,size) = self.get_index_of_sector(sector)?;
        match buf.data.get(pos..pos+size) {
            Some(dat) => Ok(dat.to_vec()),
            None => Err(Error::InvalidSectorNumber(sector))
        }
    }
    /// Write a sector, short data is padded with zeros, long data is an error
    pub fn write_sector(&self,buf: &mut Buffer,sector: usize,dat: &[u8]) -> Result<(),Error> {
        let (pos,size) = self.get_index_of_sector(sector)?;
        if dat.len() > size || pos + size > buf.data.len() {
            return Err(Error::InvalidMediaSize(format!("cannot write {} bytes to sector {}",dat.len(),sector)));
        }
        buf.data[pos..pos+dat.len()].copy_from_slice(dat);
        buf.data[pos+dat.len()..pos+size].fill(0);
        Ok(())
    }
    pub fn sector_from_track(&self,track: usize,sector: usize) -> usize {
        track * self.sectors_per_track + sector
    }
    /// Follow the track/sector link in bytes 1 and 2 of each sector, starting at `track`/`sector`,
    /// collecting `payload_size` bytes at `payload_offset` of each sector.  The walk ends at
    /// track 0 sector 0.  A sector visited twice ends the walk with a warning.
    pub fn follow_track_sector_pointers(&self,buf: &Buffer,track: usize,sector: usize,payload_offset: usize,payload_size: usize) -> Result<Vec<usize>,Error> {
        let mut ans = Vec::new();
        let mut seen = HashSet::new();
        let mut sector = self.sector_from_track(track,sector);
        while sector > 0 {
            if !seen.insert(sector) {
                warn!("track/sector chain loops back to sector {}",sector);
                break;
            }
            let (pos,size) = self.get_index_of_sector(sector)?;
            let end = usize::min(payload_offset + payload_size,size);
            ans.extend(pos+payload_offset..pos+end);
            let (t,s) = match (buf.data.get(pos+1),buf.data.get(pos+2)) {
                (Some(t),Some(s)) => (*t as usize,*s as usize),
                _ => return Err(Error::InvalidSectorNumber(sector))
            };
            let next = self.sector_from_track(t,s);
            debug!("sector: {}, pos={}, next={}",sector,pos,next);
            sector = next;
        }
        Ok(ans)
    }
    /// Offsets of the sectors named by the track/sector pairs in `ts_list`, ending at a zero track
    pub fn follow_track_sector_list(&self,buf: &Buffer,ts_list: &Segment) -> Result<Vec<usize>,Error> {
        let mut ans = Vec::new();
        let mut index = 0;
        while index + 1 < ts_list.len() {
            let track = ts_list.get(buf,index).unwrap_or(0) as usize;
            if track==0 {
                break;
            }
            let sector = ts_list.get(buf,index+1).unwrap_or(0) as usize;
            index += 2;
            let (pos,size) = self.get_index_of_sector(self.sector_from_track(track,sector))?;
            ans.extend(pos..pos+size);
        }
        Ok(ans)
    }
}
