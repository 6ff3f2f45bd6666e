//! # Media module
//!
//! A media type is the physical interpretation of a container's bytes: a floppy disk of
//! some density, a cartridge, or a cassette.  Detection is a probe cascade over `REGISTRY`;
//! each probe either builds a `Media` or returns an error, in which case the next probe is
//! tried.  If nothing matches the bytes are treated as a `RawBlob`.
//!
//! Media owns the optional filesystem found on it, see `fs::guess_filesystem`.

pub mod atr;
pub mod disk;
pub mod cart;
pub mod cassette;

use std::fmt;
use log::{debug,info};
use crate::buffer::Buffer;
use crate::segment::{Segment,SegmentKind};
use crate::fs::Filesystem;

pub use disk::{Disk,DiskKind};
pub use cart::{Cart,CartKind};
pub use cassette::Cassette;
use atr::{AtrHeader,ATR_HEADER_LEN};

#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("invalid media size: {0}")]
    InvalidMediaSize(String),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("invalid sector number {0}")]
    InvalidSectorNumber(usize),
    #[error("unsupported sector type: {0}")]
    UnsupportedSectorType(String),
    #[error("incompatible media: {0}")]
    IncompatibleMedia(String)
}

#[derive(Debug,Clone)]
pub enum Header {
    Atr(AtrHeader),
    Cart(cart::CartHeader)
}

impl Header {
    pub fn ui_name(&self) -> &'static str {
        match self {
            Self::Atr(_) => "ATR Header",
            Self::Cart(_) => "Cart Header"
        }
    }
}

#[derive(Debug,Clone)]
pub enum Layout {
    RawBlob,
    Disk(Disk),
    Cart(Cart),
    Cassette(Cassette)
}

/// A media candidate in the detection cascade
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum MediaProbe {
    Disk(DiskKind),
    Cassette,
    Cart(CartKind)
}

pub const REGISTRY: [MediaProbe;12] = [
    MediaProbe::Disk(DiskKind::AtariSD),
    MediaProbe::Disk(DiskKind::AtariED),
    MediaProbe::Disk(DiskKind::AtariDD),
    MediaProbe::Disk(DiskKind::AtariDDShortBoot),
    MediaProbe::Disk(DiskKind::AtariDDHardDrive),
    MediaProbe::Disk(DiskKind::AtariSDShort),
    MediaProbe::Disk(DiskKind::Apple16Sector),
    MediaProbe::Cassette,
    MediaProbe::Cart(CartKind::Atari8bit),
    MediaProbe::Cart(CartKind::Atari5200),
    MediaProbe::Cart(CartKind::Atari2600),
    MediaProbe::Cart(CartKind::Vectrex)
];

/// Largest sector count a DD short boot image with an ATR header may have
const MAX_SHORT_BOOT_SECTORS: usize = 720;

pub struct Media {
    pub container: usize,
    pub layout: Layout,
    pub header: Option<Header>,
    pub header_length: usize,
    pub filesystem: Option<Box<dyn Filesystem>>,
    buf_len: usize
}

impl fmt::Display for Media {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.layout {
            Layout::Disk(d) => write!(f,"{}, size={} ({}x{}B)",d.ui_name(),d.payload_len(),d.num_sectors,d.sector_size),
            _ => write!(f,"{}",self.ui_name())
        }
    }
}

fn probe_disk(kind: DiskKind,container: usize,dat: &[u8]) -> Result<Media,Error> {
    let header = match kind.is_atari() {
        true => AtrHeader::from_bytes(dat).ok(),
        false => None
    };
    let header_length = match header {
        Some(_) => ATR_HEADER_LEN,
        None => 0
    };
    match (kind,&header) {
        (DiskKind::AtariSDShort,None) => return Err(Error::InvalidHeader("short image requires an ATR header".to_string())),
        (DiskKind::AtariSDShort,Some(_)) => {
            if dat.len() > header_length + 1 && dat[header_length]==0xff && dat[header_length+1]==0xff {
                return Err(Error::InvalidHeader("probably an executable file".to_string()));
            }
        },
        (DiskKind::AtariDDShortBoot,None) if dat.len() != disk::ATARI_DD_SHORT_BOOT_SIZE => {
            return Err(Error::InvalidMediaSize("headerless short boot image must be standard size".to_string()));
        },
        _ => {}
    }
    let disk = Disk::from_layout(kind,container,header_length,dat.len())?;
    if kind==DiskKind::AtariDDShortBoot && disk.num_sectors > MAX_SHORT_BOOT_SECTORS {
        return Err(Error::InvalidMediaSize(format!("too many sectors ({}) for short boot image",disk.num_sectors)));
    }
    if let Some(h) = &header {
        h.check_media(disk.sector_size,disk.payload_len())?;
    }
    Ok(Media {
        container,
        layout: Layout::Disk(disk),
        header: header.map(Header::Atr),
        header_length,
        filesystem: None,
        buf_len: dat.len()
    })
}

impl MediaProbe {
    pub fn ui_name(&self) -> &'static str {
        match self {
            Self::Disk(k) => k.ui_name(),
            Self::Cart(k) => k.ui_name(),
            Self::Cassette => "Atari Cassette Image"
        }
    }
    /// Build media of this kind over `dat`, or explain why not
    pub fn try_media(&self,container: usize,dat: &[u8]) -> Result<Media,Error> {
        match self {
            Self::Disk(kind) => probe_disk(*kind,container,dat),
            Self::Cassette => Ok(Media {
                container,
                layout: Layout::Cassette(Cassette::probe(container,dat)?),
                header: None,
                header_length: 0,
                filesystem: None,
                buf_len: dat.len()
            }),
            Self::Cart(kind) => {
                let cart = Cart::probe(*kind,dat)?;
                Ok(Media {
                    container,
                    header: cart.header.clone().map(Header::Cart),
                    header_length: cart.header_length,
                    layout: Layout::Cart(cart),
                    filesystem: None,
                    buf_len: dat.len()
                })
            }
        }
    }
}

/// Run the probe cascade, the result is never an error
pub fn guess_media_type(container: usize,buf: &Buffer) -> Media {
    for probe in REGISTRY {
        debug!("trying media type {}",probe.ui_name());
        match probe.try_media(container,&buf.data) {
            Ok(media) => {
                info!("identified media type {}",media);
                return media;
            },
            Err(e) => debug!("{}: {}",probe.ui_name(),e)
        }
    }
    info!("no recognized media type");
    Media::raw(container,buf.len())
}

impl Media {
    pub fn raw(container: usize,buf_len: usize) -> Self {
        Self {
            container,
            layout: Layout::RawBlob,
            header: None,
            header_length: 0,
            filesystem: None,
            buf_len
        }
    }
    pub fn ui_name(&self) -> String {
        match &self.layout {
            Layout::RawBlob => "Raw Data".to_string(),
            Layout::Disk(d) => d.ui_name().to_string(),
            Layout::Cart(c) => c.ui_name(),
            Layout::Cassette(_) => "Atari Cassette Image".to_string()
        }
    }
    pub fn buf_len(&self) -> usize {
        self.buf_len
    }
    pub fn disk(&self) -> Option<&Disk> {
        match &self.layout {
            Layout::Disk(d) => Some(d),
            _ => None
        }
    }
    pub fn cart(&self) -> Option<&Cart> {
        match &self.layout {
            Layout::Cart(c) => Some(c),
            _ => None
        }
    }
    pub fn cassette(&self) -> Option<&Cassette> {
        match &self.layout {
            Layout::Cassette(c) => Some(c),
            _ => None
        }
    }
    pub fn is_atari_disk(&self) -> bool {
        match self.disk() {
            Some(d) => d.kind.is_atari(),
            None => false
        }
    }
    pub fn header_segment(&self) -> Option<Segment> {
        self.header.as_ref().map(|h| {
            Segment::new(self.container,self.buf_len,0,self.header_length,0,h.ui_name()).with_kind(SegmentKind::Header)
        })
    }
    /// Segment covering everything past the header, without children
    pub fn segment(&self) -> Segment {
        let seg = Segment::new(self.container,self.buf_len,self.header_length,self.buf_len - self.header_length,0,&self.ui_name())
            .with_kind(SegmentKind::Media);
        match &self.layout {
            Layout::Disk(d) if d.kind != DiskKind::AtariDDShortBoot => seg.with_sectors(d.starting_sector_label,d.num_sectors,d.sector_size),
            _ => seg
        }
    }
    /// Atari disks are bootable when the boot record has a load address, Atari carts always are
    pub fn is_bootable(&self,buf: &Buffer) -> bool {
        match &self.layout {
            Layout::Disk(d) if d.kind.is_atari() => match d.read_sector(buf,1) {
                Ok(boot) => u16::from_le_bytes([boot[2],boot[3]]) > 0,
                Err(_) => false
            },
            Layout::Cart(c) => c.kind==CartKind::Atari8bit || c.kind==CartKind::Atari5200,
            _ => false
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn atr_densities() {
        let mut dat = AtrHeader::new(disk::ATARI_ED_SIZE,128).to_bytes();
        dat.extend(vec![0;disk::ATARI_ED_SIZE]);
        let m = guess_media_type(0,&Buffer::new(&dat));
        assert_eq!(m.disk().map(|d| d.kind),Some(DiskKind::AtariED));
        assert_eq!(m.header_length,16);
        let mut dat = AtrHeader::new(disk::ATARI_DD_SHORT_BOOT_SIZE,256).to_bytes();
        dat.extend(vec![0;disk::ATARI_DD_SHORT_BOOT_SIZE]);
        let m = guess_media_type(0,&Buffer::new(&dat));
        assert_eq!(m.disk().map(|d| d.kind),Some(DiskKind::AtariDDShortBoot));
    }

    #[test]
    fn sector_size_mismatch_rejected() {
        let mut dat = AtrHeader::new(disk::ATARI_SD_SIZE,256).to_bytes();
        dat.extend(vec![0;disk::ATARI_SD_SIZE]);
        assert!(probe_disk(DiskKind::AtariSD,0,&dat).is_err());
    }

    #[test]
    fn declared_size_mismatch_rejected() {
        let mut dat = AtrHeader::new(disk::ATARI_SD_SIZE - 1280,128).to_bytes();
        dat.extend(vec![0;disk::ATARI_SD_SIZE]);
        assert!(probe_disk(DiskKind::AtariSD,0,&dat).is_err());
        let m = guess_media_type(0,&Buffer::new(&dat));
        assert!(m.disk().is_none());
    }

    #[test]
    fn short_image_not_executable() {
        let mut dat = AtrHeader::new(1280,128).to_bytes();
        dat.extend(vec![0xff;1280]);
        assert!(probe_disk(DiskKind::AtariSDShort,0,&dat).is_err());
        let m = guess_media_type(0,&Buffer::new(&dat));
        assert!(matches!(m.layout,Layout::RawBlob));
    }
}
