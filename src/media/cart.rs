//! # Cartridge images
//!
//! Atari 8-bit and 5200 carts may carry the atari800 `CART` header, which is big endian.
//! The header's type index selects an entry of `KNOWN_CARTS`, giving the fixed (main)
//! region and the bank layout.  Headerless images are recognized by size alone.
//! Atari 2600 and Vectrex carts never have a header.

use std::io::Cursor;
use binrw::{BinRead,BinWrite};
use log::debug;
use crate::segment::{Segment,SegmentKind};
use super::Error;

pub const CART_HEADER_LEN: usize = 16;
const CART_5200_TYPES: [u32;6] = [4,6,7,16,19,20];

/// Layout of a cart type, sizes and offsets in KB.
/// `main` and `bank` are (size,offset,origin).
#[derive(Debug)]
pub struct CartType {
    pub id: u32,
    pub name: &'static str,
    pub size_kb: usize,
    pub main: Option<(usize,usize,u16)>,
    pub bank: Option<(usize,usize,u16)>
}

const fn plain(id: u32,name: &'static str,size_kb: usize) -> CartType {
    CartType { id, name, size_kb, main: None, bank: None }
}
const fn fixed(id: u32,name: &'static str,size_kb: usize,main: (usize,usize,u16)) -> CartType {
    CartType { id, name, size_kb, main: Some(main), bank: None }
}
const fn banked(id: u32,name: &'static str,size_kb: usize,main: (usize,usize,u16),bank: (usize,usize,u16)) -> CartType {
    CartType { id, name, size_kb, main: Some(main), bank: Some(bank) }
}

/// Cart types known to atari800
pub static KNOWN_CARTS: &[CartType] = &[
    fixed(57,"Standard 2 KB",2,(2,0,0xb800)),
    fixed(58,"Standard 4 KB",4,(4,0,0xb000)),
    fixed(59,"Right slot 4 KB",4,(4,0,0x9000)),
    fixed(1,"Standard 8 KB",8,(8,0,0xa000)),
    plain(21,"Right slot 8 KB",8),
    fixed(2,"Standard 16 KB",16,(16,0,0x8000)),
    plain(44,"OSS 8 KB",8),
    plain(15,"OSS one chip 16 KB",16),
    banked(3,"OSS two chip (034M) 16 KB",16,(4,12,0xb000),(4,0,0xa000)),
    banked(45,"OSS two chip (043M) 16 KB",16,(4,12,0xb000),(4,0,0xa000)),
    banked(12,"XEGS 32 KB",32,(8,24,0xa000),(8,0,0x8000)),
    banked(13,"XEGS (banks 0-7) 64 KB",64,(8,56,0xa000),(8,0,0x8000)),
    banked(67,"XEGS (banks 8-15) 64 KB",64,(8,56,0xa000),(8,0,0x8000)),
    banked(14,"XEGS 128 KB",128,(8,120,0xa000),(8,0,0x8000)),
    banked(23,"XEGS 256 KB",256,(8,248,0xa000),(8,0,0x8000)),
    banked(24,"XEGS 512 KB",512,(8,504,0xa000),(8,0,0x8000)),
    banked(25,"XEGS 1 MB",1024,(8,1016,0xa000),(8,0,0x8000)),
    banked(33,"Switchable XEGS 32 KB",32,(8,24,0xa000),(8,0,0x8000)),
    banked(34,"Switchable XEGS 64 KB",64,(8,56,0xa000),(8,0,0x8000)),
    banked(35,"Switchable XEGS 128 KB",128,(8,120,0xa000),(8,0,0x8000)),
    banked(36,"Switchable XEGS 256 KB",256,(8,248,0xa000),(8,0,0x8000)),
    banked(37,"Switchable XEGS 512 KB",512,(8,504,0xa000),(8,0,0x8000)),
    banked(38,"Switchable XEGS 1 MB",1024,(8,1016,0xa000),(8,0,0x8000)),
    plain(22,"Williams 32 KB",32),
    plain(8,"Williams 64 KB",64),
    plain(9,"Express 64 KB",64),
    plain(10,"Diamond 64 KB",64),
    plain(11,"SpartaDOS X 64 KB",64),
    plain(43,"SpartaDOS X 128 KB",128),
    plain(17,"Atrax 128 KB",128),
    plain(18,"Bounty Bob 40 KB",40),
    plain(26,"MegaCart 16 KB",16),
    plain(27,"MegaCart 32 KB",32),
    plain(28,"MegaCart 64 KB",64),
    plain(29,"MegaCart 128 KB",128),
    plain(30,"MegaCart 256 KB",256),
    plain(31,"MegaCart 512 KB",512),
    plain(32,"MegaCart 1 MB",1024),
    plain(39,"Phoenix 8 KB",8),
    plain(46,"Blizzard 4 KB",4),
    fixed(40,"Blizzard 16 KB",16,(16,0,0x8000)),
    plain(60,"Blizzard 32 KB",32),
    plain(41,"Atarimax 128 KB Flash",128),
    plain(42,"Atarimax 1 MB Flash",1024),
    plain(47,"AST 32 KB",32),
    plain(48,"Atrax SDX 64 KB",64),
    plain(49,"Atrax SDX 128 KB",128),
    plain(50,"Turbosoft 64 KB",64),
    plain(51,"Turbosoft 128 KB",128),
    plain(52,"Ultracart 32 KB",32),
    fixed(53,"Low bank 8 KB",8,(8,0,0x8000)),
    plain(5,"DB 32 KB",32),
    plain(54,"SIC! 128 KB",128),
    plain(55,"SIC! 256 KB",256),
    plain(56,"SIC! 512 KB",512),
    plain(61,"MegaMax 2 MB",2048),
    plain(62,"The!Cart 128 MB",128*1024),
    plain(63,"Flash MegaCart 4 MB",4096),
    plain(64,"MegaCart 2 MB",2048),
    plain(65,"The!Cart 32 MB",32*1024),
    plain(66,"The!Cart 64 MB",64*1024),
    fixed(20,"Standard 4 KB 5200",4,(4,0,0x8000)),
    fixed(19,"Standard 8 KB 5200",8,(8,0,0x8000)),
    fixed(4,"Standard 32 KB 5200",32,(32,0,0x4000)),
    plain(16,"One chip 16 KB 5200",16),
    plain(6,"Two chip 16 KB 5200",16),
    plain(7,"Bounty Bob 40 KB 5200",40),
];

pub fn get_cart(id: u32) -> Result<&'static CartType,Error> {
    match KNOWN_CARTS.iter().find(|c| c.id==id) {
        Some(c) => Ok(c),
        None => Err(Error::InvalidHeader(format!("Unsupported cart type {}",id)))
    }
}

#[derive(BinRead,BinWrite,Debug,Clone,PartialEq)]
#[brw(big, magic = b"CART")]
pub struct CartHeader {
    pub cart_type: u32,
    pub checksum: u32,
    pub unused: u32
}

impl CartHeader {
    /// Header for the given type, the checksum is the byte sum of the payload
    pub fn new(cart_type: u32,payload: &[u8]) -> Self {
        let checksum = payload.iter().fold(0u32,|sum,b| sum.wrapping_add(*b as u32));
        Self { cart_type, checksum, unused: 0 }
    }
    pub fn from_bytes(dat: &[u8]) -> Result<Self,Error> {
        if dat.len() < CART_HEADER_LEN {
            return Err(Error::InvalidHeader(format!("Short cart header: should be 16 bytes; found {}",dat.len())));
        }
        match Self::read(&mut Cursor::new(&dat[0..CART_HEADER_LEN])) {
            Ok(h) => Ok(h),
            Err(_) => Err(Error::InvalidHeader("No Atari 8-bit cart header".to_string()))
        }
    }
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut curs = Cursor::new(Vec::new());
        let _ = self.write(&mut curs);
        curs.into_inner()
    }
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum CartKind {
    Atari8bit,
    Atari5200,
    Atari2600,
    Vectrex
}

impl CartKind {
    pub fn ui_name(&self) -> &'static str {
        match self {
            Self::Atari8bit => "Atari 8bit Cart",
            Self::Atari5200 => "Atari 5200 Cart",
            Self::Atari2600 => "Atari 2600 Cart",
            Self::Vectrex => "Vectrex Cart"
        }
    }
}

/// A contiguous part of the cart as the CPU sees it
#[derive(Debug,Clone)]
pub struct CartRegion {
    pub name: String,
    pub offset: usize,
    pub len: usize,
    pub origin: u16
}

#[derive(Debug,Clone)]
pub struct Cart {
    pub kind: CartKind,
    pub header: Option<CartHeader>,
    pub cart_type: Option<&'static CartType>,
    pub header_length: usize,
    pub size: usize,
    pub regions: Vec<CartRegion>
}

impl Cart {
    /// Try to interpret the whole buffer as a cart of the given kind
    pub fn probe(kind: CartKind,dat: &[u8]) -> Result<Self,Error> {
        match kind {
            CartKind::Atari8bit | CartKind::Atari5200 => Self::probe_atari(kind,dat),
            CartKind::Atari2600 => Self::probe_2600(dat),
            CartKind::Vectrex => Self::probe_vectrex(dat)
        }
    }
    fn check_kilobytes(size: usize) -> Result<(),Error> {
        if size==0 || size % 1024 != 0 {
            return Err(Error::InvalidMediaSize("Cart not multiple of 1K".to_string()));
        }
        Ok(())
    }
    fn probe_atari(kind: CartKind,dat: &[u8]) -> Result<Self,Error> {
        let want_5200 = kind==CartKind::Atari5200;
        let (header,header_length,cart_type) = match CartHeader::from_bytes(dat) {
            Ok(h) => {
                if CART_5200_TYPES.contains(&h.cart_type) != want_5200 {
                    return Err(Error::InvalidHeader(format!("cart type {} is not a {}",h.cart_type,kind.ui_name())));
                }
                let c = get_cart(h.cart_type)?;
                if c.size_kb * 1024 != dat.len() - CART_HEADER_LEN {
                    return Err(Error::InvalidHeader(format!("Invalid cart size: {}, expected {} for {}",dat.len() - CART_HEADER_LEN,c.size_kb*1024,c.name)));
                }
                (Some(h),CART_HEADER_LEN,c)
            },
            Err(_) => {
                let id = match (want_5200,dat.len()) {
                    (false,0x2000) => 1,
                    (false,0x4000) => 2,
                    (true,0x8000) => 4,
                    (true,0xa000) => 7,
                    _ => return Err(Error::InvalidMediaSize(format!("{} without header has unexpected size {}",kind.ui_name(),dat.len())))
                };
                (None,0,get_cart(id)?)
            }
        };
        let size = dat.len() - header_length;
        Self::check_kilobytes(size)?;
        debug!("cart type {}: {}",cart_type.id,cart_type.name);
        let mut regions = Vec::new();
        match cart_type.main {
            Some((main_kb,offset_kb,origin)) => {
                regions.push(CartRegion {
                    name: format!("Main {}K @ ${:04x}",main_kb,origin),
                    offset: header_length + offset_kb * 1024,
                    len: main_kb * 1024,
                    origin
                });
                if let Some((bank_kb,bank_offset_kb,bank_origin)) = cart_type.bank {
                    let mut remaining = cart_type.size_kb.saturating_sub(main_kb);
                    let mut offset_kb = bank_offset_kb;
                    let mut num = 0;
                    while remaining > 0 && bank_kb > 0 {
                        regions.push(CartRegion {
                            name: format!("Bank {} {}K @ ${:04x}",num,bank_kb,bank_origin),
                            offset: header_length + offset_kb * 1024,
                            len: bank_kb * 1024,
                            origin: bank_origin
                        });
                        offset_kb += bank_kb;
                        remaining = remaining.saturating_sub(bank_kb);
                        num += 1;
                    }
                }
            },
            None => regions.push(CartRegion {
                name: format!("{} {}K",cart_type.name,cart_type.size_kb),
                offset: header_length,
                len: size,
                origin: 0
            })
        }
        Ok(Self { kind, header, cart_type: Some(cart_type), header_length, size, regions })
    }
    fn probe_2600(dat: &[u8]) -> Result<Self,Error> {
        let size = dat.len();
        if size != 0x800 && size != 0x1000 && size != 0x2000 {
            return Err(Error::InvalidMediaSize(format!("Atari 2600 cart has unexpected size {}",size)));
        }
        let reset_hi = dat[size-3];
        if reset_hi & 0xf0 != 0xf0 && reset_hi & 0xf0 != 0x10 {
            return Err(Error::InvalidHeader(format!("Atari 2600 reset vector page ${:02x} is not in cart space",reset_hi)));
        }
        let regions = match size {
            0x800 => vec![CartRegion { name: "2K @ $f800".to_string(), offset: 0, len: 0x800, origin: 0xf800 }],
            0x1000 => vec![CartRegion { name: "4K @ $f000".to_string(), offset: 0, len: 0x1000, origin: 0xf000 }],
            _ => vec![
                CartRegion { name: "Bank 0 4K @ $f000".to_string(), offset: 0, len: 0x1000, origin: 0xf000 },
                CartRegion { name: "Bank 1 4K @ $f000".to_string(), offset: 0x1000, len: 0x1000, origin: 0xf000 }
            ]
        };
        Ok(Self { kind: CartKind::Atari2600, header: None, cart_type: None, header_length: 0, size, regions })
    }
    fn probe_vectrex(dat: &[u8]) -> Result<Self,Error> {
        if !dat.starts_with(b"g GCE") {
            return Err(Error::InvalidHeader("no Vectrex copyright magic".to_string()));
        }
        let regions = vec![CartRegion { name: format!("{}K @ $0000",dat.len()/1024), offset: 0, len: dat.len(), origin: 0 }];
        Ok(Self { kind: CartKind::Vectrex, header: None, cart_type: None, header_length: 0, size: dat.len(), regions })
    }
    pub fn ui_name(&self) -> String {
        match self.cart_type {
            Some(c) => format!("{} ({})",self.kind.ui_name(),c.name),
            None => format!("{}K {}",self.size/1024,self.kind.ui_name())
        }
    }
    /// One segment per region, each with the CPU origin of the region
    pub fn segments(&self,container: usize,buf_len: usize) -> Vec<Segment> {
        self.regions.iter()
            .map(|r| Segment::new(container,buf_len,r.offset,r.len,r.origin as usize,&r.name).with_kind(SegmentKind::Raw))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn xegs_banks() {
        let mut dat = CartHeader::new(12,&[0;0x8000]).to_bytes();
        dat.extend(vec![0;0x8000]);
        let cart = Cart::probe(CartKind::Atari8bit,&dat).expect("probe failed");
        assert_eq!(cart.regions.len(),4);
        assert_eq!(cart.regions[0].origin,0xa000);
        assert_eq!(cart.regions[0].offset,16+24*1024);
        assert_eq!(cart.regions[3].offset,16+16*1024);
        assert!(Cart::probe(CartKind::Atari5200,&dat).is_err());
    }

    #[test]
    fn headerless() {
        let cart = Cart::probe(CartKind::Atari8bit,&[0;0x2000]).expect("probe failed");
        assert_eq!(cart.regions[0].origin,0xa000);
        assert!(Cart::probe(CartKind::Atari8bit,&[0;0x3000]).is_err());
        let mut vcs = vec![0;0x1000];
        vcs[0xffd] = 0xf0;
        assert_eq!(Cart::probe(CartKind::Atari2600,&vcs).expect("probe failed").regions[0].origin,0xf000);
        vcs[0xffd] = 0x80;
        assert!(Cart::probe(CartKind::Atari2600,&vcs).is_err());
    }
}
