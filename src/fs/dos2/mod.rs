//! # Atari DOS 2 file system module
//!
//! Handles single, enhanced, and double density disks.  The VTOC is sector 360, plus
//! sector 1024 on enhanced density disks, where the two sectors are stitched into one
//! segment.  The directory is sectors 361-368, 8 dirents of 16 bytes per sector (only the
//! first 128 bytes of each sector are used on double density).
//!
//! File data sectors end in a 3 byte trailer: 6 bits of file number, 10 bits of next sector,
//! and the number of bytes used in the sector.

pub mod types;

use std::collections::HashSet;
use log::{debug,warn};
use types::*;
use super::{Error,FileError,Dirent,DirentMeta,Directory,Filesystem};
use crate::buffer::Buffer;
use crate::file_types::FileHint;
use crate::media::{Media,Disk,DiskKind};
use crate::media::atr::{AtrHeader,ATR_HEADER_LEN};
use crate::media::disk::{ATARI_SD_SIZE,ATARI_ED_SIZE,ATARI_DD_SIZE};
use crate::segment::{Segment,SegmentKind};

pub const UI_NAME: &str = "Atari DOS 2";

/// Flags in the order `o2mud*`, unset flags are `.` (locked is a space)
pub fn status_flags(flag: u8) -> String {
    let pick = |bit: u8,c: char,blank: char| if flag & bit > 0 { c } else { blank };
    [
        pick(FLAG_OPENED_OUTPUT,'o','.'),
        pick(FLAG_DOS_2,'2','.'),
        pick(FLAG_MYDOS,'m','.'),
        pick(FLAG_IN_USE,'u','.'),
        pick(FLAG_DELETED,'d','.'),
        pick(FLAG_LOCKED,'*',' ')
    ].iter().collect()
}

/// Parse the boot record and build the boot segment, shared with KBoot
pub(crate) fn boot_segment(disk: &Disk,buf: &Buffer) -> Result<(BootRecord,Segment),Error> {
    let first = disk.read_sector(buf,1)?;
    let boot = BootRecord::from_bytes(&first)?;
    let count = boot.boot_sectors();
    let mut seg = disk.get_contiguous_sectors(1,count,"Boot Sectors")
        .map_err(|e| Error::IncompatibleMedia(format!("Invalid boot sector: {}",e)))?
        .with_kind(SegmentKind::Boot);
    let origin = boot.bldadr as usize;
    seg.origin = origin;
    let header = seg.slice(0,6,origin,"Boot Header");
    let code = seg.slice(6,seg.len().saturating_sub(6),origin + 6,"Boot Code");
    seg.segments = vec![header,code];
    Ok((boot,seg))
}

fn read_bytes(buf: &Buffer,idx: &[usize]) -> Vec<u8> {
    idx.iter().map(|i| buf.data.get(*i).copied().unwrap_or(0)).collect()
}

fn write_bytes(buf: &mut Buffer,idx: &[usize],dat: &[u8]) {
    for (i,b) in idx.iter().zip(dat) {
        if let Some(slot) = buf.data.get_mut(*i) {
            *slot = *b;
        }
    }
}

/// The primary interface for Atari DOS 2 disks.
pub struct AtariDos2 {
    disk: Disk,
    boot_sectors: usize,
    vtoc_sectors: Vec<usize>,
    vtoc_idx: Vec<usize>,
    vtoc: Vtoc,
    directory: Directory
}

impl AtariDos2 {
    pub fn probe(media: &Media,buf: &Buffer) -> Result<Self,Error> {
        let disk = match media.disk() {
            Some(d) if d.kind.is_atari() => d.clone(),
            _ => return Err(Error::IncompatibleMedia(format!("{} needs Atari sector access",UI_NAME)))
        };
        if !disk.is_sector_valid(FIRST_DIR_SECTOR + DIR_SECTORS - 1) {
            return Err(Error::IncompatibleMedia("Disk image too small to contain a directory".to_string()));
        }
        let (boot,_) = boot_segment(&disk,buf)?;
        let (vtoc_sectors,max_sector) = match disk.num_sectors==ED_MAX_SECTOR && disk.sector_size==128 {
            true => (vec![VTOC_SECTOR,VTOC2_SECTOR],ED_MAX_SECTOR),
            false => (vec![VTOC_SECTOR],SD_MAX_SECTOR)
        };
        let vtoc_idx = disk.get_sector_list_offsets(&vtoc_sectors,None)?;
        let vtoc = Vtoc::from_bytes(&read_bytes(buf,&vtoc_idx),max_sector)?;
        debug!("VTOC code {}, total {}, unused {}",vtoc.code,vtoc.total_sectors,vtoc.unused_sectors);
        let dir_sectors: Vec<usize> = (FIRST_DIR_SECTOR..FIRST_DIR_SECTOR+DIR_SECTORS).collect();
        let dir_idx = disk.get_sector_list_offsets(&dir_sectors,Some(DIR_BYTES_PER_SECTOR))?;
        let mut dirents = Vec::new();
        for slot in 0..MAX_DIRENTS {
            let entry = dir_idx[slot*DIRENT_SIZE..(slot+1)*DIRENT_SIZE].to_vec();
            let rec = DirentRecord::from_bytes(&read_bytes(buf,&entry))?;
            if rec.flag & FLAG_IN_USE == 0 || rec.flag & FLAG_DELETED > 0 {
                continue;
            }
            dirents.push(Self::parse_dirent(&disk,buf,slot,&rec,entry));
        }
        Ok(Self {
            disk,
            boot_sectors: boot.boot_sectors(),
            vtoc_sectors,
            vtoc_idx,
            vtoc,
            directory: Directory {
                name: "DOS2 Directory".to_string(),
                idx: dir_idx,
                dirents
            }
        })
    }
    fn parse_dirent(disk: &Disk,buf: &Buffer,file_num: usize,rec: &DirentRecord,entry: Vec<usize>) -> Dirent {
        let mut ans = Dirent::new(file_num,DirentMeta::AtariDos2 { flag: rec.flag },entry);
        ans.basename = rec.basename();
        ans.ext = rec.extension();
        ans.num_sectors = rec.count as usize;
        ans.starting_sector = rec.start as usize;
        ans.hint = FileHint::Atari;
        if !disk.is_sector_valid(ans.starting_sector) || ans.num_sectors > disk.num_sectors {
            ans.mark_insane(&format!("starting sector {} or count {} out of range",ans.starting_sector,ans.num_sectors));
            return ans;
        }
        match Self::follow_file(disk,buf,&ans,rec.flag & FLAG_MYDOS > 0) {
            Ok((file,sectors)) => {
                ans.file = file;
                ans.sectors = sectors;
            },
            Err(e) => ans.mark_insane(&e.to_string())
        }
        ans
    }
    /// Walk the sector chain, returning file offsets and sectors
    fn follow_file(disk: &Disk,buf: &Buffer,dirent: &Dirent,mydos: bool) -> Result<(Vec<usize>,Vec<usize>),FileError> {
        let mut offsets = Vec::new();
        let mut sectors = Vec::new();
        let mut seen = HashSet::new();
        let mut next = dirent.starting_sector;
        let mut remaining = dirent.num_sectors;
        while next > 0 && remaining > 0 {
            let (index,size) = disk.get_index_of_sector(next).map_err(|e| FileError::ByteNotInFile166(e.to_string()))?;
            let trailer = match buf.data.get(index+size-3..index+size) {
                Some(t) => [t[0],t[1],t[2]],
                None => return Err(FileError::ByteNotInFile166(format!("sector {} past end of image",next)))
            };
            let file_num = (trailer[0] >> 2) as usize;
            if file_num != dirent.file_num {
                let msg = format!("Expecting file {}, found {}",dirent.file_num,file_num);
                match mydos {
                    true => warn!("{}: {}",dirent.filename(),msg),
                    false => return Err(FileError::FileNumberMismatch164(msg))
                }
            }
            seen.insert(next);
            sectors.push(next);
            let num_bytes = usize::min(trailer[2] as usize,size-3);
            offsets.extend(index..index+num_bytes);
            next = (((trailer[0] & 0x03) as usize) << 8) | trailer[1] as usize;
            if seen.contains(&next) {
                return Err(FileError::FileStructure(format!("Bad sector pointer data: attempting to reread sector {}",next)));
            }
            remaining -= 1;
        }
        Ok((offsets,sectors))
    }
    pub fn vtoc(&self) -> &Vtoc {
        &self.vtoc
    }
    fn check_unlocked(dirent: &Dirent) -> Result<(),Error> {
        match dirent.meta {
            DirentMeta::AtariDos2 { flag } if flag & FLAG_LOCKED > 0 => Err(Error::InvalidDirent(format!("{} is locked",dirent.filename()))),
            _ => Ok(())
        }
    }
    fn free_slot(&self,buf: &Buffer) -> Result<usize,Error> {
        for slot in 0..MAX_DIRENTS {
            let flag = buf.data.get(self.directory.idx[slot*DIRENT_SIZE]).copied().unwrap_or(0);
            if flag==0 || flag & FLAG_DELETED > 0 {
                return Ok(slot);
            }
        }
        Err(Error::NoSpaceInDirectory)
    }
}

impl Filesystem for AtariDos2 {
    fn ui_name(&self) -> &'static str {
        UI_NAME
    }
    fn segments(&self,buf: &Buffer) -> Vec<Segment> {
        let mut ans = Vec::new();
        match boot_segment(&self.disk,buf) {
            Ok((_,seg)) => ans.push(seg),
            Err(e) => warn!("boot segment: {}",e)
        }
        let vtoc_name = match self.vtoc_sectors.len() {
            1 => "DOS2 SD VTOC",
            _ => "DOS2 ED VTOC"
        };
        let mut vtoc = Segment::from_indexes(self.disk.container,buf.len(),&self.vtoc_idx,0,vtoc_name).with_kind(SegmentKind::Vtoc);
        if self.vtoc_sectors.len()==1 {
            vtoc = vtoc.with_sectors(VTOC_SECTOR,1,self.disk.sector_size);
        }
        ans.push(vtoc);
        ans.push(self.directory.segment(self.disk.container,buf));
        ans
    }
    fn directory(&self) -> Option<&Directory> {
        Some(&self.directory)
    }
    fn comments(&self) -> Vec<(usize,String)> {
        let mut ans = Vec::new();
        for d in &self.directory.dirents {
            let n = d.file_num;
            for (offset,text) in [(0,"Flag"),(1,"Number of sectors in file"),(3,"Starting sector number"),(5,"Filename"),(0x0d,"Extension")] {
                ans.push((d.entry[offset],format!("FILE #{}: {}",n,text)));
            }
        }
        ans
    }
    fn vtoc_info(&self) -> Vec<String> {
        vec![
            format!("DOS code: {}",self.vtoc.code),
            format!("total sectors: {}",self.vtoc.total_sectors),
            format!("unused sectors: {}",self.vtoc.unused_sectors),
            format!("VTOC sectors: {:?}",self.vtoc_sectors)
        ]
    }
    fn num_free_sectors(&self) -> Option<usize> {
        Some(self.vtoc.num_free_sectors())
    }
    fn free_sector_map(&self) -> Option<Vec<bool>> {
        Some(self.vtoc.map.iter().collect())
    }
    fn write_file(&self,buf: &mut Buffer,filename: &str,dat: &[u8]) -> Result<(),Error> {
        let (base,ext) = super::split_filename(filename,8,3)?;
        let mut vtoc = self.vtoc.clone();
        let slot = match self.directory.dirents.iter().find(|d| d.matches(filename,false)) {
            Some(old) => {
                Self::check_unlocked(old)?;
                debug!("replacing {}",old.filename());
                vtoc.free_sector_list(&old.sectors);
                old.file_num
            },
            None => self.free_slot(buf)?
        };
        let payload = self.disk.sector_size - 3;
        let chunks: Vec<&[u8]> = match dat.len() {
            0 => vec![dat],
            _ => dat.chunks(payload).collect()
        };
        let sectors = vtoc.reserve_space(chunks.len())?;
        debug!("writing {} to sectors {:?}",filename,sectors);
        for (i,chunk) in chunks.iter().enumerate() {
            let (_,size) = self.disk.get_index_of_sector(sectors[i])?;
            let next = sectors.get(i+1).copied().unwrap_or(0);
            let mut sec = vec![0;size];
            sec[0..chunk.len()].copy_from_slice(chunk);
            sec[size-3] = ((slot << 2) as u8) | ((next >> 8) & 0x03) as u8;
            sec[size-2] = (next & 0xff) as u8;
            sec[size-1] = chunk.len() as u8;
            self.disk.write_sector(buf,sectors[i],&sec)?;
        }
        let rec = DirentRecord::new(FLAG_DOS_2 | FLAG_IN_USE,sectors.len(),sectors[0],&base,&ext);
        write_bytes(buf,&self.directory.idx[slot*DIRENT_SIZE..(slot+1)*DIRENT_SIZE],&rec.to_bytes());
        write_bytes(buf,&self.vtoc_idx,&vtoc.to_bytes());
        Ok(())
    }
    fn delete_file(&self,buf: &mut Buffer,filename: &str) -> Result<(),Error> {
        let dirent = match self.directory.dirents.iter().find(|d| d.matches(filename,false)) {
            Some(d) => d,
            None => return Err(Error::FileNotFound(filename.to_string()))
        };
        Self::check_unlocked(dirent)?;
        let mut vtoc = self.vtoc.clone();
        vtoc.free_sector_list(&dirent.sectors);
        write_bytes(buf,&dirent.entry[0..1],&[FLAG_DELETED]);
        write_bytes(buf,&self.vtoc_idx,&vtoc.to_bytes());
        Ok(())
    }
}

/// Blank formatted DOS 2 image with an ATR header.  Boot sectors are left empty.
pub fn create(kind: DiskKind) -> Result<Vec<u8>,Error> {
    let (size,sector_size) = match kind {
        DiskKind::AtariSD => (ATARI_SD_SIZE,128),
        DiskKind::AtariED => (ATARI_ED_SIZE,128),
        DiskKind::AtariDD => (ATARI_DD_SIZE,256),
        _ => return Err(Error::Unsupported(format!("{} on {}",UI_NAME,kind.ui_name())))
    };
    let mut dat = AtrHeader::new(size,sector_size).to_bytes();
    dat.extend(vec![0;size]);
    let disk = Disk::from_layout(kind,0,ATR_HEADER_LEN,dat.len())?;
    let mut buf = Buffer::new(&dat);
    let (vtoc_sectors,max_sector) = match kind {
        DiskKind::AtariED => (vec![VTOC_SECTOR,VTOC2_SECTOR],ED_MAX_SECTOR),
        _ => (vec![VTOC_SECTOR],SD_MAX_SECTOR)
    };
    let vtoc_idx = disk.get_sector_list_offsets(&vtoc_sectors,None)?;
    let mut raw = vec![0;vtoc_idx.len()];
    raw[0] = 2;
    let mut vtoc = Vtoc::from_bytes(&raw,max_sector)?;
    let map_len = vtoc.map.len();
    for s in (4..VTOC_SECTOR).chain(FIRST_DIR_SECTOR+DIR_SECTORS..map_len) {
        vtoc.map.set(s,true);
    }
    vtoc.total_sectors = vtoc.num_free_sectors();
    vtoc.unused_sectors = vtoc.total_sectors;
    write_bytes(&mut buf,&vtoc_idx,&vtoc.to_bytes());
    Ok(buf.data)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flags() {
        assert_eq!(status_flags(0x42),".2.u. ");
        assert_eq!(status_flags(0x63),"o2.u.*");
    }

    #[test]
    fn blank_disks() {
        let sd = create(DiskKind::AtariSD).expect("create failed");
        assert_eq!(sd.len(),ATARI_SD_SIZE+16);
        let ed = create(DiskKind::AtariED).expect("create failed");
        let disk = Disk::from_layout(DiskKind::AtariED,0,16,ed.len()).unwrap();
        let idx = disk.get_sector_list_offsets(&[VTOC_SECTOR,VTOC2_SECTOR],None).unwrap();
        let vtoc = Vtoc::from_bytes(&read_bytes(&Buffer::new(&ed),&idx),ED_MAX_SECTOR).unwrap();
        assert_eq!(vtoc.num_free_sectors(),707+304);
        assert!(create(DiskKind::Apple16Sector).is_err());
    }
}
