//! # KBoot images
//!
//! A KBoot image is a single executable preceded by a 3 sector boot loader.  The loader
//! stores the executable size at offset 9 of the first sector, and the executable follows
//! immediately in sector 4.  There is no VTOC; the directory is synthesized from the size.

use log::debug;
use super::{Error,FileError,Dirent,DirentMeta,Directory,Filesystem};
use super::dos2::boot_segment;
use crate::buffer::Buffer;
use crate::file_types::FileHint;
use crate::media::{Media,Disk};
use crate::media::atr::AtrHeader;
use crate::segment::Segment;

pub const UI_NAME: &str = "Atari KBoot";
const SECTOR_SIZE: usize = 128;
const BOOT_BYTES: usize = 384;
const SIZE_OFFSET: usize = 9;
const TITLE_OFFSET: usize = 268;
const AUTHOR_OFFSET: usize = 308;
const TITLE_COLOR: u8 = 0b1100_0000;
const AUTHOR_COLOR: u8 = 0b0100_0000;
pub const DEFAULT_TITLE: &str = "DEMO";
pub const DEFAULT_AUTHOR: &str = "an atari user";

/// Loader for the first 3 sectors, includes the display list and screen text
const XEXBOOT_HEADER: [u8;300] = [
    0x00,0x03,0x00,0x07,0x0d,0x07,0x4c,0x0d,0x07,0x1c,0x5b,0x00,0x00,0xa0,0x00,0x8c,
    0x09,0x03,0x8c,0x04,0x03,0x8c,0x44,0x02,0x8c,0xe2,0x02,0x8c,0xe3,0x02,0xc8,0x84,
    0x09,0x8c,0x01,0x03,0xce,0x06,0x03,0xa9,0x31,0x8d,0x00,0x03,0xa9,0x52,0x8d,0x02,
    0x03,0xa9,0x80,0x8d,0x08,0x03,0xa9,0x01,0x8d,0x05,0x03,0xa9,0xe3,0x8d,0x30,0x02,
    0x8d,0x02,0xd4,0xa9,0x07,0x8d,0x31,0x02,0x8d,0x03,0xd4,0xa9,0x00,0xaa,0x8d,0x0b,
    0x03,0xa9,0x04,0x8d,0x0a,0x03,0x20,0xbc,0x07,0xca,0x20,0xa5,0x07,0x85,0x43,0x20,
    0xa5,0x07,0x85,0x44,0x25,0x43,0xc9,0xff,0xf0,0xf0,0x20,0xa5,0x07,0x85,0x45,0x20,
    0xa5,0x07,0x85,0x46,0x20,0xa5,0x07,0x91,0x43,0xe6,0x43,0xd0,0x02,0xe6,0x44,0xa5,
    0x45,0xc5,0x43,0xa5,0x46,0xe5,0x44,0xb0,0xeb,0xad,0xe2,0x02,0x0d,0xe3,0x02,0xf0,
    0xc9,0x86,0x19,0x20,0xa2,0x07,0xa6,0x19,0xa0,0x00,0x8c,0xe2,0x02,0x8c,0xe3,0x02,
    0xf0,0xb8,0x6c,0xe2,0x02,0xad,0x09,0x07,0xd0,0x0b,0xad,0x0a,0x07,0xd0,0x03,0x6c,
    0xe0,0x02,0xce,0x0a,0x07,0xce,0x09,0x07,0xe0,0x80,0x90,0x22,0xa9,0x40,0x8d,0x03,
    0x03,0x20,0x59,0xe4,0x10,0x06,0xce,0x01,0x07,0xd0,0xf1,0x00,0xee,0x0a,0x03,0xd0,
    0x03,0xee,0x0b,0x03,0xad,0x0a,0x03,0x8d,0x19,0xd0,0xa0,0x00,0xa2,0x00,0xbd,0x00,
    0x01,0xe8,0x60,0x70,0x70,0x70,0x70,0x70,0x46,0xf8,0x07,0x70,0x07,0x70,0x70,0x70,
    0x06,0x70,0x06,0x70,0x06,0x41,0xe3,0x07,0x00,0x00,0x00,0x00,0x00,0x2c,0x2f,0x21,
    0x24,0x29,0x2e,0x27,0x0e,0x0e,0x0e,0x00,0x00,0x00,0x00,0x00,0x00,0x00,0x00,0x00,
    0x00,0x00,0x00,0x00,0x00,0x00,0x00,0x00,0x00,0x00,0x00,0x00,0x00,0x00,0x00,0x00,
    0x00,0x00,0x00,0x00,0x00,0x00,0x00,0x00,0x26,0x32,0x2f,0x2d
];

pub struct KBoot {
    disk: Disk,
    directory: Directory
}

impl KBoot {
    /// `basename` names the executable, the extension follows its case
    pub fn probe(media: &Media,buf: &Buffer,basename: &str) -> Result<Self,Error> {
        let disk = match media.disk() {
            Some(d) if d.kind.is_atari() && d.sector_size==SECTOR_SIZE => d.clone(),
            _ => return Err(Error::IncompatibleMedia(format!("{} needs 128 byte Atari sectors",UI_NAME)))
        };
        boot_segment(&disk,buf)?;
        let entry: Vec<usize> = (disk.header_length+SIZE_OFFSET..disk.header_length+SIZE_OFFSET+3).collect();
        let count = entry.iter().rev().fold(0,|acc,i| (acc << 8) + buf.data.get(*i).copied().unwrap_or(0) as usize);
        let payload_len = disk.payload_len();
        if BOOT_BYTES + count > payload_len || BOOT_BYTES + count + SECTOR_SIZE < payload_len {
            return Err(Error::NotEnoughSpaceOnDisk(format!("KBoot header reports size {}; media only {}",count,payload_len)));
        }
        debug!("KBoot executable size {}",count);
        let mut dirent = Dirent::new(0,DirentMeta::KBoot { exe_size: count },entry.clone());
        dirent.basename = match basename.len() {
            0 => "KBOOT".to_string(),
            _ => basename.to_string()
        };
        dirent.ext = match dirent.basename==dirent.basename.to_uppercase() {
            true => "XEX".to_string(),
            false => "xex".to_string()
        };
        dirent.starting_sector = 4;
        dirent.num_sectors = count / SECTOR_SIZE + 1;
        dirent.hint = FileHint::Atari;
        let start = disk.header_length + BOOT_BYTES;
        dirent.file = (start..start+count).collect();
        dirent.sectors = (4..4+(count + SECTOR_SIZE - 1)/SECTOR_SIZE).collect();
        Ok(Self {
            disk,
            directory: Directory {
                name: "KBoot Directory".to_string(),
                idx: entry,
                dirents: vec![dirent]
            }
        })
    }
}

impl Filesystem for KBoot {
    fn ui_name(&self) -> &'static str {
        UI_NAME
    }
    fn segments(&self,buf: &Buffer) -> Vec<Segment> {
        let mut ans = Vec::new();
        if let Ok((_,seg)) = boot_segment(&self.disk,buf) {
            ans.push(seg);
        }
        ans.push(self.directory.segment(self.disk.container,buf));
        ans
    }
    fn directory(&self) -> Option<&Directory> {
        Some(&self.directory)
    }
    fn comments(&self) -> Vec<(usize,String)> {
        match self.directory.idx.first() {
            Some(i) => vec![(*i,"Executable size".to_string())],
            None => Vec::new()
        }
    }
}

/// Screen codes for `text`, centered in a 20 character field starting at `offset`
fn insert_text(boot: &mut [u8],offset: usize,text: &str,color: u8) {
    let codes: Vec<u8> = text.to_uppercase().bytes().take(20).map(|b| b.wrapping_sub(32) | color).collect();
    let tx = offset + (20 - codes.len()) / 2;
    boot[tx..tx+codes.len()].copy_from_slice(&codes);
}

/// Build a bootable ATR image that loads the executable `xex`
pub fn create_kboot_image(xex: &[u8],title: Option<&str>,author: Option<&str>) -> Result<Vec<u8>,Error> {
    if !xex.starts_with(&[0xff,0xff]) {
        return Err(Error::File(FileError::InvalidBinaryFile("executable must start with FFFF".to_string())));
    }
    if xex.len() > u16::MAX as usize {
        return Err(Error::NotEnoughSpaceOnDisk(format!("executable too large for KBoot ({} bytes)",xex.len())));
    }
    let mut boot = vec![0;BOOT_BYTES];
    boot[0..XEXBOOT_HEADER.len()].copy_from_slice(&XEXBOOT_HEADER);
    boot[SIZE_OFFSET..SIZE_OFFSET+2].copy_from_slice(&u16::to_le_bytes(xex.len() as u16));
    insert_text(&mut boot,TITLE_OFFSET,title.unwrap_or(DEFAULT_TITLE),TITLE_COLOR);
    insert_text(&mut boot,AUTHOR_OFFSET,author.unwrap_or(DEFAULT_AUTHOR),AUTHOR_COLOR);
    let padded = (xex.len() + SECTOR_SIZE - 1) / SECTOR_SIZE * SECTOR_SIZE;
    let mut payload = boot;
    payload.extend_from_slice(xex);
    payload.resize(BOOT_BYTES + padded,0);
    let mut ans = AtrHeader::new(payload.len(),SECTOR_SIZE).to_bytes();
    ans.append(&mut payload);
    Ok(ans)
}
