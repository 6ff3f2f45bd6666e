use std::io::Cursor;
use binrw::{BinRead,BinWrite};
use bit_vec::BitVec;
use super::super::Error;

pub const VTOC_SECTOR: usize = 360;
pub const VTOC2_SECTOR: usize = 1024;
pub const FIRST_DIR_SECTOR: usize = 361;
pub const DIR_SECTORS: usize = 8;
pub const DIRENT_SIZE: usize = 16;
pub const MAX_DIRENTS: usize = 64;
pub const DIR_BYTES_PER_SECTOR: usize = 128;
/// bitmap bytes in the first VTOC sector
pub const BITMAP_RANGE: std::ops::Range<usize> = 0x0a..0x64;
/// bitmap bytes for sectors 720..1023, relative to the stitched ED VTOC
pub const BITMAP2_RANGE: std::ops::Range<usize> = 0xd4..0xfa;
/// second VTOC sector's copy of the bitmap for sectors 48..719
pub const MIRROR_RANGE: std::ops::Range<usize> = 0x80..0xd4;
/// first bitmap byte that is mirrored
pub const MIRROR_START: usize = 6;
/// unused sectors above 719, relative to the stitched ED VTOC
pub const UNUSED2_RANGE: std::ops::Range<usize> = 0xfa..0xfc;
pub const SD_MAX_SECTOR: usize = 720;
pub const ED_MAX_SECTOR: usize = 1040;

pub const FLAG_OPENED_OUTPUT: u8 = 0x01;
pub const FLAG_DOS_2: u8 = 0x02;
pub const FLAG_MYDOS: u8 = 0x04;
pub const FLAG_IS_DIR: u8 = 0x10;
pub const FLAG_LOCKED: u8 = 0x20;
pub const FLAG_IN_USE: u8 = 0x40;
pub const FLAG_DELETED: u8 = 0x80;

#[derive(BinRead,BinWrite,Debug,Clone)]
#[brw(little)]
pub struct BootRecord {
    pub bflag: u8,
    pub brcnt: u8,
    pub bldadr: u16,
    pub bwtarr: u16
}

impl BootRecord {
    pub fn from_bytes(dat: &[u8]) -> Result<Self,Error> {
        Self::read(&mut Cursor::new(dat)).map_err(|e| Error::IncompatibleMedia(format!("Invalid boot sector: {}",e)))
    }
    /// boot sector count, non-standard boot flags get the DOS default of 3
    pub fn boot_sectors(&self) -> usize {
        match (self.bflag,self.brcnt) {
            (0,0) => 3,
            (0,n) => n as usize,
            _ => 3
        }
    }
}

#[derive(BinRead,BinWrite,Debug,Clone)]
#[brw(little)]
pub struct DirentRecord {
    pub flag: u8,
    pub count: u16,
    pub start: u16,
    pub name: [u8;8],
    pub ext: [u8;3]
}

fn padded<const N: usize>(s: &str) -> [u8;N] {
    let mut ans = [0x20;N];
    for (i,b) in s.bytes().take(N).enumerate() {
        ans[i] = b;
    }
    ans
}

fn trimmed(raw: &[u8]) -> String {
    raw.iter().map(|b| *b as char).collect::<String>().trim_end().to_string()
}

impl DirentRecord {
    pub fn new(flag: u8,count: usize,start: usize,basename: &str,ext: &str) -> Self {
        Self {
            flag,
            count: count as u16,
            start: start as u16,
            name: padded(basename),
            ext: padded(ext)
        }
    }
    pub fn from_bytes(dat: &[u8]) -> Result<Self,Error> {
        Self::read(&mut Cursor::new(dat)).map_err(|e| Error::InvalidDirent(e.to_string()))
    }
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut curs = Cursor::new(Vec::new());
        let _ = self.write(&mut curs);
        curs.into_inner()
    }
    pub fn basename(&self) -> String {
        trimmed(&self.name)
    }
    pub fn extension(&self) -> String {
        trimmed(&self.ext)
    }
}

/// Volume table of contents.  The free sector map is indexed by sector number, `true` is free.
#[derive(Debug,Clone)]
pub struct Vtoc {
    pub code: u8,
    pub total_sectors: usize,
    pub unused_sectors: usize,
    pub max_sector: usize,
    pub map: BitVec,
    raw: Vec<u8>
}

impl Vtoc {
    /// Parse from the VTOC bytes, 128 or 256 bytes for 1 sector, 256 for the stitched ED VTOC
    pub fn from_bytes(dat: &[u8],max_sector: usize) -> Result<Self,Error> {
        if dat.len() < BITMAP_RANGE.end {
            return Err(Error::IncompatibleMedia("VTOC too short".to_string()));
        }
        let code = dat[0];
        if code != 0 && code != 2 {
            return Err(Error::IncompatibleMedia(format!("Invalid VTOC code {}",code)));
        }
        let total_sectors = u16::from_le_bytes([dat[1],dat[2]]) as usize;
        if total_sectors > max_sector {
            return Err(Error::IncompatibleMedia(format!("Invalid number of sectors {}",total_sectors)));
        }
        let mut unused_sectors = u16::from_le_bytes([dat[3],dat[4]]) as usize;
        let mut map = BitVec::from_bytes(&dat[BITMAP_RANGE]);
        if max_sector==ED_MAX_SECTOR {
            if dat.len() < UNUSED2_RANGE.end {
                return Err(Error::IncompatibleMedia("ED VTOC too short".to_string()));
            }
            map.append(&mut BitVec::from_bytes(&dat[BITMAP2_RANGE]));
            unused_sectors += u16::from_le_bytes([dat[UNUSED2_RANGE.start],dat[UNUSED2_RANGE.start+1]]) as usize;
        }
        Ok(Self { code, total_sectors, unused_sectors, max_sector, map, raw: dat.to_vec() })
    }
    /// Rebuild the VTOC bytes from the fields and map.
    /// On ED disks the first sector counts unused sectors below 720 and the second
    /// sector counts the rest, and also carries a copy of the map for sectors 48..719.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut ans = self.raw.clone();
        ans[0] = self.code;
        ans[1..3].copy_from_slice(&u16::to_le_bytes(self.total_sectors as u16));
        ans[3..5].copy_from_slice(&u16::to_le_bytes(self.unused_sectors as u16));
        let packed = self.map.to_bytes();
        let n1 = BITMAP_RANGE.len();
        ans[BITMAP_RANGE].copy_from_slice(&packed[0..n1]);
        if self.max_sector==ED_MAX_SECTOR && packed.len() >= n1 + BITMAP2_RANGE.len() && ans.len() >= UNUSED2_RANGE.end {
            ans[BITMAP2_RANGE].copy_from_slice(&packed[n1..n1+BITMAP2_RANGE.len()]);
            ans[MIRROR_RANGE].copy_from_slice(&packed[MIRROR_START..n1]);
            let upper = self.map.iter().skip(SD_MAX_SECTOR).filter(|b| *b).count();
            let lower = self.unused_sectors.saturating_sub(upper);
            ans[3..5].copy_from_slice(&u16::to_le_bytes(lower as u16));
            ans[UNUSED2_RANGE].copy_from_slice(&u16::to_le_bytes(upper as u16));
        }
        ans
    }
    pub fn num_free_sectors(&self) -> usize {
        self.map.iter().filter(|b| *b).count()
    }
    pub fn is_free(&self,sector: usize) -> bool {
        self.map.get(sector).unwrap_or(false)
    }
    /// Allocate `n` sectors by first-free search, in ascending order.
    /// Nothing is allocated unless all `n` are available.
    pub fn reserve_space(&mut self,n: usize) -> Result<Vec<usize>,Error> {
        let order: Vec<usize> = self.map.iter().enumerate().filter(|(_,free)| *free).map(|(i,_)| i).take(n).collect();
        if order.len() < n {
            return Err(Error::NotEnoughSpaceOnDisk(format!("Need {} sectors, VTOC has only {} available",n,order.len())));
        }
        for s in &order {
            self.map.set(*s,false);
        }
        self.unused_sectors = self.unused_sectors.saturating_sub(n);
        Ok(order)
    }
    pub fn free_sector_list(&mut self,sectors: &[usize]) {
        for s in sectors {
            if *s < self.map.len() && !self.map[*s] {
                self.map.set(*s,true);
                self.unused_sectors += 1;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn blank_vtoc() -> Vec<u8> {
        let mut dat = vec![0;128];
        dat[0] = 2;
        dat[1..3].copy_from_slice(&u16::to_le_bytes(707));
        dat[3..5].copy_from_slice(&u16::to_le_bytes(707));
        let mut map = BitVec::from_elem(720,false);
        for s in (4..360).chain(369..720) {
            map.set(s,true);
        }
        dat[BITMAP_RANGE].copy_from_slice(&map.to_bytes());
        dat
    }

    #[test]
    fn reserve_and_free() {
        let dat = blank_vtoc();
        let mut vtoc = Vtoc::from_bytes(&dat,SD_MAX_SECTOR).expect("bad vtoc");
        assert_eq!(vtoc.num_free_sectors(),707);
        let got = vtoc.reserve_space(3).expect("no space");
        assert_eq!(got,vec![4,5,6]);
        assert_eq!(vtoc.unused_sectors,704);
        assert!(vtoc.to_bytes() != dat);
        vtoc.free_sector_list(&got);
        assert_eq!(vtoc.to_bytes(),dat);
        assert!(vtoc.reserve_space(800).is_err());
        assert_eq!(vtoc.to_bytes(),dat);
    }

    #[test]
    fn ed_second_sector() {
        let mut dat = vec![0;256];
        dat[0] = 2;
        let mut vtoc = Vtoc::from_bytes(&dat,ED_MAX_SECTOR).expect("bad vtoc");
        assert_eq!(vtoc.map.len(),1024);
        for s in (4..360).chain(369..1024) {
            vtoc.map.set(s,true);
        }
        vtoc.total_sectors = vtoc.num_free_sectors();
        vtoc.unused_sectors = vtoc.total_sectors;
        vtoc.reserve_space(710).expect("no space");
        let bytes = vtoc.to_bytes();
        assert_eq!(bytes[3..5],u16::to_le_bytes(0));
        assert_eq!(bytes[UNUSED2_RANGE],u16::to_le_bytes(301));
        assert_eq!(bytes[MIRROR_RANGE],bytes[BITMAP_RANGE.start+MIRROR_START..BITMAP_RANGE.end]);
        let back = Vtoc::from_bytes(&bytes,ED_MAX_SECTOR).expect("bad vtoc");
        assert_eq!(back.unused_sectors,301);
        assert_eq!(back.num_free_sectors(),301);
    }

    #[test]
    fn dirent_record() {
        let rec = DirentRecord::new(0x42,3,4,"A128","DAT");
        let bytes = rec.to_bytes();
        assert_eq!(bytes.len(),DIRENT_SIZE);
        assert_eq!(bytes[0..5],[0x42,3,0,4,0]);
        let back = DirentRecord::from_bytes(&bytes).unwrap();
        assert_eq!(back.basename(),"A128");
        assert_eq!(back.extension(),"DAT");
    }
}
