//! # Apple DOS 3.3 file system module
//!
//! Read only support for 16 sector floppies.  The VTOC is track 17 sector 0, it points to
//! the first catalog sector.  Catalog sectors and track/sector list sectors are linked lists,
//! the link is in bytes 1 and 2 of each sector.

pub mod types;

use log::debug;
use num_traits::FromPrimitive;
use types::*;
use super::{Error,Dirent,DirentMeta,Directory,Filesystem};
use crate::buffer::Buffer;
use crate::file_types::FileHint;
use crate::media::{Media,Disk,DiskKind};
use crate::segment::{Segment,SegmentKind};

pub const UI_NAME: &str = "Apple DOS 3.3";

/// Catalog letter for the file type, the locked bit is ignored
pub fn type_letter(file_type: u8) -> char {
    match FileType::from_u8(file_type & 0x7f) {
        Some(t) => t.letter(),
        None => '?'
    }
}

/// (name,first sector on track 0,number of sectors,load address)
const BOOT_STAGES: [(&str,usize,usize,usize);4] = [
    ("Boot 1",0,1,0x0800),
    ("Boot 2",1,9,0x3700),
    ("Relocator",10,2,0x1b00),
    ("Boot 3",12,4,0x1d00)
];

pub struct AppleDos33 {
    disk: Disk,
    vtoc: VtocRecord,
    directory: Directory
}

impl AppleDos33 {
    pub fn probe(media: &Media,buf: &Buffer) -> Result<Self,Error> {
        let disk = match media.disk() {
            Some(d) if d.kind==DiskKind::Apple16Sector => d.clone(),
            _ => return Err(Error::IncompatibleMedia(format!("{} needs a 16 sector Apple disk",UI_NAME)))
        };
        let vtoc = VtocRecord::from_bytes(&disk.read_sector(buf,disk.sector_from_track(VTOC_TRACK,0))?)?;
        vtoc.verify()?;
        let (offset,size) = CATALOG_PAYLOAD;
        let cat_idx = disk.follow_track_sector_pointers(buf,vtoc.track1 as usize,vtoc.sector1 as usize,offset,size)?;
        debug!("catalog has {} bytes",cat_idx.len());
        let mut dirents = Vec::new();
        for (k,entry) in cat_idx.chunks_exact(DIRENT_SIZE).enumerate() {
            let raw: Vec<u8> = entry.iter().map(|i| buf.data.get(*i).copied().unwrap_or(0)).collect();
            let rec = DirectoryEntry::from_bytes(&raw)?;
            if rec.is_never_used() {
                continue;
            }
            dirents.push(Self::parse_dirent(&disk,buf,k,&rec,entry.to_vec()));
        }
        Ok(Self {
            disk,
            vtoc,
            directory: Directory {
                name: "Catalog".to_string(),
                idx: cat_idx,
                dirents
            }
        })
    }
    fn parse_dirent(disk: &Disk,buf: &Buffer,file_num: usize,rec: &DirectoryEntry,entry: Vec<usize>) -> Dirent {
        let file_type = rec.file_type & 0x7f;
        let track = rec.real_track();
        let meta = DirentMeta::AppleDos33 {
            track,
            sector: rec.tsl_sector,
            file_type,
            locked: rec.file_type & 0x80 > 0,
            deleted: rec.is_deleted()
        };
        let mut ans = Dirent::new(file_num,meta,entry);
        ans.basename = rec.name();
        ans.num_sectors = rec.sectors as usize;
        ans.starting_sector = disk.sector_from_track(track as usize,rec.tsl_sector as usize);
        ans.hint = match FileType::from_u8(file_type) {
            Some(FileType::Binary) => FileHint::AppleBinary,
            _ => FileHint::Plain
        };
        if !disk.is_sector_valid(ans.starting_sector) {
            ans.mark_insane(&format!("T/S list at track {} sector {} is off the disk",track,rec.tsl_sector));
            return ans;
        }
        if rec.is_deleted() {
            // listed only, the file is not followed
            ans.in_use = false;
            return ans;
        }
        let (offset,size) = TSLIST_PAYLOAD;
        let ts_list = match disk.follow_track_sector_pointers(buf,track as usize,rec.tsl_sector as usize,offset,size) {
            Ok(l) => l,
            Err(e) => {
                ans.mark_insane(&e.to_string());
                return ans;
            }
        };
        let ts_seg = Segment::from_indexes(disk.container,buf.len(),&ts_list,0,"Track/Sector List");
        match disk.follow_track_sector_list(buf,&ts_seg) {
            Ok(file) => {
                ans.sectors = file.iter().step_by(disk.sector_size).map(|o| (o - disk.header_length)/disk.sector_size).collect();
                ans.file = file;
                ans.ts_list = ts_list;
            },
            Err(e) => ans.mark_insane(&e.to_string())
        }
        ans
    }
    pub fn volume(&self) -> u8 {
        self.vtoc.vol
    }
}

impl Filesystem for AppleDos33 {
    fn ui_name(&self) -> &'static str {
        UI_NAME
    }
    fn segments(&self,buf: &Buffer) -> Vec<Segment> {
        let mut ans = Vec::new();
        if let Ok(boot) = self.disk.get_contiguous_sectors(0,self.disk.sectors_per_track,"DOS 3.3 Boot Track") {
            let mut boot = boot.with_kind(SegmentKind::Boot);
            for (name,first,count,origin) in BOOT_STAGES {
                let size = self.disk.sector_size;
                boot.segments.push(boot.slice(first*size,count*size,origin,name).with_sectors(first,count,size));
            }
            ans.push(boot);
        }
        let vtoc_sector = self.disk.sector_from_track(VTOC_TRACK,0);
        if let Ok(vtoc) = self.disk.get_contiguous_sectors(vtoc_sector,1,"VTOC") {
            ans.push(vtoc.with_kind(SegmentKind::Vtoc));
        }
        ans.push(self.directory.segment(self.disk.container,buf));
        ans
    }
    fn directory(&self) -> Option<&Directory> {
        Some(&self.directory)
    }
    fn comments(&self) -> Vec<(usize,String)> {
        let mut ans = Vec::new();
        for d in &self.directory.dirents {
            for (offset,text) in [(0,"Track of T/S list"),(1,"Sector of T/S list"),(2,"File type"),(3,"Filename"),(33,"Number of sectors")] {
                ans.push((d.entry[offset],format!("FILE #{}: {}",d.file_num,text)));
            }
        }
        ans
    }
    fn vtoc_info(&self) -> Vec<String> {
        let v = &self.vtoc;
        vec![
            format!("catalog track/sector: {}/{}",v.track1,v.sector1),
            format!("DOS release: {}",v.version),
            format!("volume: {}",v.vol),
            format!("max track/sector pairs: {}",v.max_pairs),
            format!("last track allocated: {}",v.last_track),
            format!("allocation direction: {}",v.last_direction as i8),
            format!("tracks: {}",v.tracks),
            format!("sectors per track: {}",v.sectors),
            format!("bytes per sector: {}",v.bytes)
        ]
    }
    fn num_free_sectors(&self) -> Option<usize> {
        let total = TRACKS as usize * SECTORS as usize;
        Some(self.vtoc.unpack_bitmap().iter().take(total).filter(|b| *b).count())
    }
    fn free_sector_map(&self) -> Option<Vec<bool>> {
        let total = TRACKS as usize * SECTORS as usize;
        Some(self.vtoc.unpack_bitmap().iter().take(total).collect())
    }
}
