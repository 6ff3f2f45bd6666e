//! # Disk Communicator
//!
//! DCM is a sector level compressor for Atari disk images.  The stream is a series of
//! passes.  Each pass starts with a 4 byte header (`0xFA`, flags, first sector LE16) and
//! holds sector records until a `0x45` pass end record.  A record is a block type byte and
//! its payload.  If the high bit of the block type is set the next record is for the next
//! sector, otherwise an explicit LE16 sector number follows the record.
//!
//! Flags are pass number in bits 0-4, density in bits 5-6, last pass in bit 7.
//! Blank sectors are never stored.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use log::{debug,trace};
use super::Error;
use crate::media;

const VALID_DENSITIES: [(usize,usize);3] = [(720,128),(720,256),(1040,128)];
const PASS_BUFFER_LIMIT: usize = 0x5e00;
const DEFAULT_BLOCKS: [u8;4] = [0x41,0x42,0x43,0x44];

#[derive(FromPrimitive,Debug,Clone,Copy,PartialEq)]
pub enum BlockType {
    ChangeBegin = 0x41,
    DosSector = 0x42,
    RunLength = 0x43,
    ChangeEnd = 0x44,
    PassEnd = 0x45,
    SameAsPrevious = 0x46,
    Uncompressed = 0x47
}

fn invalid(msg: &str) -> Error {
    Error::InvalidAlgorithm(msg.to_string())
}

struct Decoder<'a> {
    raw: &'a [u8],
    index: usize,
    sector_size: usize,
    num_sectors: usize,
    current_sector: usize,
    current: [u8;256],
    output: Vec<u8>
}

impl<'a> Decoder<'a> {
    fn get_next(&mut self) -> Result<u8,Error> {
        match self.raw.get(self.index) {
            Some(b) => {
                self.index += 1;
                Ok(*b)
            },
            None => Err(invalid("Incomplete DCM file"))
        }
    }
    fn get_current_sector(&mut self) -> Result<(),Error> {
        let lo = self.get_next()? as usize;
        let hi = self.get_next()? as usize;
        self.current_sector = hi * 256 + lo;
        trace!("index {}: found sector {}",self.index-2,self.current_sector);
        Ok(())
    }
    fn copy_current_to_sector(&mut self) -> Result<(),Error> {
        if self.current_sector < 1 || self.current_sector > self.num_sectors {
            return Err(invalid(&format!("DCM sector {} out of range",self.current_sector)));
        }
        let pos = (self.current_sector - 1) * self.sector_size;
        self.output[pos..pos+self.sector_size].copy_from_slice(&self.current[0..self.sector_size]);
        Ok(())
    }
    fn decode_41(&mut self) -> Result<(),Error> {
        let index = self.get_next()? as usize;
        for i in (0..=index).rev() {
            self.current[i] = self.get_next()?;
        }
        Ok(())
    }
    fn decode_42(&mut self) -> Result<(),Error> {
        let fill = self.get_next()?;
        self.current[0..124].fill(fill);
        for i in 124..128 {
            self.current[i] = self.get_next()?;
        }
        Ok(())
    }
    fn decode_43(&mut self) -> Result<(),Error> {
        let mut index = 0;
        while index < self.sector_size {
            // verbatim run
            let mut end = self.get_next()? as usize;
            if index > 0 && end==0 {
                end = 256;
            }
            while index < end {
                self.current[index] = self.get_next()?;
                index += 1;
            }
            if index < self.sector_size {
                // fill run, an empty fill is never stored so 0 is always 256
                let mut end = self.get_next()? as usize;
                if end==0 {
                    end = 256;
                }
                let fill = self.get_next()?;
                while index < end {
                    self.current[index] = fill;
                    index += 1;
                }
            }
        }
        Ok(())
    }
    fn decode_44(&mut self) -> Result<(),Error> {
        let mut index = self.get_next()? as usize;
        while index < self.sector_size {
            self.current[index] = self.get_next()?;
            index += 1;
        }
        Ok(())
    }
    fn decode_47(&mut self) -> Result<(),Error> {
        for i in 0..self.sector_size {
            self.current[i] = self.get_next()?;
        }
        Ok(())
    }
    fn start_pass(&mut self,expected_pass: u8) -> Result<bool,Error> {
        let archive_type = self.get_next()?;
        if archive_type != 0xf9 && archive_type != 0xfa {
            return Err(invalid("Not a DCM file"));
        }
        let flags = self.get_next()?;
        let last_pass = flags & 0x80 > 0;
        debug!("pass number={} last={}",flags & 0x1f,last_pass);
        if flags & 0x1f != expected_pass {
            return match archive_type {
                0xf9 => Err(invalid("DCM multi-file archive combined in the wrong order")),
                _ => Err(invalid("Expected pass one of DCM archive first"))
            };
        }
        let density = ((flags >> 5) & 3) as usize;
        if density >= VALID_DENSITIES.len() {
            return Err(invalid(&format!("Unsupported density flag {} in DCM",density)));
        }
        (self.num_sectors,self.sector_size) = VALID_DENSITIES[density];
        let needed = self.num_sectors * self.sector_size;
        if self.output.len() < needed {
            self.output.resize(needed,0);
        }
        self.get_current_sector()?;
        Ok(last_pass)
    }
    fn run(mut self) -> Result<Vec<u8>,Error> {
        let mut expected_pass: u8 = 1;
        let mut last_pass = false;
        while !last_pass {
            last_pass = self.start_pass(expected_pass)?;
            loop {
                let block_type = self.get_next()?;
                trace!("processing sector {}, type=${:02x}",self.current_sector,block_type & 0x7f);
                if block_type==0x45 {
                    expected_pass = (expected_pass + 1) % 32;
                    break;
                }
                match BlockType::from_u8(block_type & 0x7f) {
                    Some(BlockType::ChangeBegin) => self.decode_41()?,
                    Some(BlockType::DosSector) => self.decode_42()?,
                    Some(BlockType::RunLength) => self.decode_43()?,
                    Some(BlockType::ChangeEnd) => self.decode_44()?,
                    Some(BlockType::SameAsPrevious) => {},
                    Some(BlockType::Uncompressed) => self.decode_47()?,
                    _ => match block_type {
                        0xfa | 0xf9 => return Err(invalid("Found section start byte but previous section never ended")),
                        _ => return Err(invalid(&format!("Unsupported block type {} in DCM",block_type)))
                    }
                }
                self.copy_current_to_sector()?;
                if block_type & 0x80 > 0 {
                    self.current_sector += 1;
                } else {
                    self.get_current_sector()?;
                }
            }
        }
        self.output.truncate(self.num_sectors * self.sector_size);
        Ok(self.output)
    }
}

/// Decode a DCM stream into a headerless disk image of `num_sectors * sector_size` bytes
pub fn decompress(dat: &[u8]) -> Result<Vec<u8>,Error> {
    let dec = Decoder {
        raw: dat,
        index: 0,
        sector_size: 0,
        num_sectors: 0,
        current_sector: 0,
        current: [0;256],
        output: Vec::new()
    };
    dec.run()
}

enum EncoderArg {
    None,
    Index(usize),
    Groups(Vec<(usize,usize)>)
}

struct Encoder<'a> {
    sector_size: usize,
    density_flag: u8,
    pass_number: u8,
    current: [u8;256],
    previous: [u8;256],
    pass_buffer: Vec<u8>,
    record_start_index: usize,
    allowed: &'a [u8]
}

impl<'a> Encoder<'a> {
    fn put_byte(&mut self,val: u8) {
        self.pass_buffer.push(val);
    }
    fn start_record(&mut self,block_type: u8) {
        self.record_start_index = self.pass_buffer.len();
        self.put_byte(block_type);
    }
    fn encode_sector(&mut self,sector: usize) {
        self.put_byte((sector & 0xff) as u8);
        self.put_byte((sector >> 8) as u8);
    }
    fn encode_implicit_next_sector(&mut self) {
        self.pass_buffer[self.record_start_index] |= 0x80;
    }
    fn fa_header(&self,sector: usize,last_pass: bool) -> [u8;4] {
        let mut flag = self.density_flag << 5 | self.pass_number & 0x1f;
        if last_pass {
            flag |= 0x80;
        }
        [0xfa,flag,(sector & 0xff) as u8,(sector >> 8) as u8]
    }
    fn is_allowed(&self,block_type: u8) -> bool {
        self.allowed.contains(&block_type)
    }
    /// Run length groups `[start,end)` of repeated bytes and the encoded length they imply
    fn prepare_43(&self) -> Option<(usize,Vec<(usize,usize)>)> {
        let size = self.sector_size;
        let same: Vec<usize> = (0..size-1).filter(|i| self.current[*i+1]==self.current[*i]).collect();
        if same.len()==0 {
            return None;
        }
        let mut groups: Vec<(usize,usize)> = Vec::new();
        let mut run_start = same[0];
        for k in 1..same.len() {
            if same[k] - same[k-1] > 1 {
                groups.push((run_start,same[k-1] + 2));
                run_start = same[k];
            }
        }
        groups.push((run_start,same[same.len()-1] + 2));
        let mut length = 0;
        let mut index = 0;
        for (start,end) in &groups {
            length += 1 + start - index;
            index = *start;
            if index < size {
                length += 2;
            }
            index = *end;
        }
        if index < size {
            length += 1 + size - index;
            groups.push((size,size));
        }
        Some((length,groups))
    }
    fn encode_best(&mut self,first: bool) {
        let size = self.sector_size;
        let mut best_size = size;
        let mut best_block = BlockType::Uncompressed;
        let mut arg = EncoderArg::None;
        if !first {
            let diffs: Vec<usize> = (0..size).filter(|i| self.current[*i] != self.previous[*i]).collect();
            match (diffs.first(),diffs.last()) {
                (Some(first_diff),Some(last_diff)) => {
                    let len_41 = last_diff + 1;
                    if len_41 < best_size && self.is_allowed(0x41) {
                        best_size = len_41;
                        best_block = BlockType::ChangeBegin;
                        arg = EncoderArg::Index(*last_diff);
                    }
                    let len_44 = size - first_diff + 1;
                    if len_44 < best_size && self.is_allowed(0x44) {
                        best_size = len_44;
                        best_block = BlockType::ChangeEnd;
                        arg = EncoderArg::Index(*first_diff);
                    }
                },
                _ => {
                    best_size = 0;
                    best_block = BlockType::SameAsPrevious;
                }
            }
        }
        // 0x42 only restores the first 128 bytes
        if size==128 && best_size > 6 && self.is_allowed(0x42) {
            let first_change = (1..size).find(|i| self.current[*i] != self.current[0]).unwrap_or(size);
            if first_change > 123 {
                best_size = 6;
                best_block = BlockType::DosSector;
            }
        }
        if self.is_allowed(0x43) {
            if let Some((len_43,groups)) = self.prepare_43() {
                if len_43 < best_size {
                    best_size = len_43;
                    best_block = BlockType::RunLength;
                    arg = EncoderArg::Groups(groups);
                }
            }
        }
        trace!("dcm: encoding as block type ${:x}, size={}",best_block as u8,best_size);
        match (best_block,arg) {
            (BlockType::ChangeBegin,EncoderArg::Index(i)) => self.encode_41(i),
            (BlockType::DosSector,_) => self.encode_42(),
            (BlockType::RunLength,EncoderArg::Groups(g)) => self.encode_43(&g),
            (BlockType::ChangeEnd,EncoderArg::Index(i)) => self.encode_44(i),
            (BlockType::SameAsPrevious,_) => self.start_record(0x46),
            _ => self.encode_47()
        }
    }
    fn encode_41(&mut self,index: usize) {
        self.start_record(0x41);
        self.put_byte(index as u8);
        for i in (0..=index).rev() {
            self.put_byte(self.current[i]);
        }
    }
    fn encode_42(&mut self) {
        self.start_record(0x42);
        for i in 123..128 {
            self.put_byte(self.current[i]);
        }
    }
    fn encode_43(&mut self,groups: &[(usize,usize)]) {
        self.start_record(0x43);
        let size = self.sector_size;
        let mut index = 0;
        for (rle_start,rle_end) in groups {
            // offsets of 256 are stored as 0
            self.put_byte(*rle_start as u8);
            while index < *rle_start {
                self.put_byte(self.current[index]);
                index += 1;
            }
            if index < size {
                self.put_byte(*rle_end as u8);
                self.put_byte(self.current[index]);
                index += rle_end - rle_start;
            }
        }
    }
    fn encode_44(&mut self,index: usize) {
        self.start_record(0x44);
        self.put_byte(index as u8);
        for i in index..self.sector_size {
            self.put_byte(self.current[i]);
        }
    }
    fn encode_47(&mut self) {
        self.start_record(0x47);
        for i in 0..self.sector_size {
            self.put_byte(self.current[i]);
        }
    }
}

/// Encode the disk image `dat`, whose layout is given by `disk`.  The disk must be one of the
/// three standard DCM densities.  `allowed` restricts the block types that may be chosen,
/// `0x46` and `0x47` are always allowed.
pub fn compress(dat: &[u8],disk: &media::Disk,allowed: Option<&[u8]>) -> Result<Vec<u8>,Error> {
    let geometry = (disk.num_sectors,disk.sector_size);
    let density_flag = match VALID_DENSITIES.iter().position(|d| *d==geometry) {
        Some(d) => d as u8,
        None => return Err(Error::Media(media::Error::InvalidMediaSize("DCM Compressor only works with standard size Atari disk images".to_string())))
    };
    let mut enc = Encoder {
        sector_size: disk.sector_size,
        density_flag,
        pass_number: 1,
        current: [0;256],
        previous: [0;256],
        pass_buffer: Vec::new(),
        record_start_index: 0,
        allowed: allowed.unwrap_or(&DEFAULT_BLOCKS)
    };
    let mut output = Vec::new();
    let mut current_sector = 1;
    let mut previous_sector = 0;
    while current_sector <= disk.num_sectors {
        debug!("dcm: starting pass {} at sector {}",enc.pass_number,current_sector);
        enc.pass_buffer.clear();
        let header = enc.fa_header(current_sector,false);
        enc.pass_buffer.extend_from_slice(&header);
        enc.record_start_index = 0;
        let mut first_sector_in_pass = 0;
        while enc.pass_buffer.len() < PASS_BUFFER_LIMIT && current_sector <= disk.num_sectors {
            let (pos,size) = disk.get_index_of_sector(current_sector)?;
            if pos + size > dat.len() {
                return Err(Error::Media(media::Error::InvalidMediaSize(format!("sector {} is past the end of the data",current_sector))));
            }
            // short boot sectors are padded to the full sector size
            enc.current[0..enc.sector_size].fill(0);
            enc.current[0..size].copy_from_slice(&dat[pos..pos+size]);
            if enc.current[0..enc.sector_size].iter().all(|b| *b==0) {
                trace!("dcm: skipping empty sector {}",current_sector);
                current_sector += 1;
                continue;
            }
            if first_sector_in_pass==0 {
                first_sector_in_pass = current_sector;
                previous_sector = current_sector;
            }
            if current_sector - previous_sector > 1 {
                enc.encode_sector(current_sector);
            } else {
                enc.encode_implicit_next_sector();
            }
            enc.encode_best(current_sector==first_sector_in_pass);
            enc.previous = enc.current;
            previous_sector = current_sector;
            current_sector += 1;
        }
        // the next pass never reads a sector number
        enc.encode_implicit_next_sector();
        enc.start_record(0x45);
        let last_pass = current_sector > disk.num_sectors;
        let header = enc.fa_header(first_sector_in_pass,last_pass);
        enc.pass_buffer[0..4].copy_from_slice(&header);
        output.extend_from_slice(&enc.pass_buffer);
        enc.pass_number = enc.pass_number.wrapping_add(1) % 32;
    }
    Ok(output)
}

#[cfg(test)]
mod test {
    use super::*;

    fn sd_image() -> Vec<u8> {
        let mut ans = vec![0;720*128];
        for i in 0..720 {
            ans[i*128..(i+1)*128].fill(i as u8);
        }
        ans
    }

    #[test]
    fn hand_built_stream() {
        // pass 1 of 1, single density, sector 1 uncompressed, sector 2 same, then sector 4 fill
        let mut dat = vec![0xfa,0x81,0x01,0x00,0x47|0x80];
        dat.extend_from_slice(&[0x55;128]);
        dat.extend_from_slice(&[0x46,0x04,0x00]);
        dat.extend_from_slice(&[0x42|0x80,0x11,1,2,3,4]);
        dat.push(0x45);
        let out = decompress(&dat).expect("decode failed");
        assert_eq!(out.len(),92160);
        assert_eq!(out[0..256],[0x55;256]);
        assert_eq!(out[256..384],[0;128]);
        assert_eq!(out[384..508],[0x11;124]);
        assert_eq!(out[508..512],[1,2,3,4]);
    }

    #[test]
    fn rejects_bad_streams() {
        assert!(decompress(&[0xfa,0x82,0x01,0x00]).is_err());
        assert!(decompress(&[0xfa,0x81,0x01,0x00,0x99]).is_err());
        assert!(decompress(&[0xfa,0x81,0x01,0x00,0x47]).is_err());
        assert!(decompress(&[0x96,0x02]).is_err());
    }

    #[test]
    fn each_block_type_round_trips() {
        let mut img = sd_image();
        for i in (0..img.len()).step_by(100) {
            img[i] = 0xff;
        }
        let disk = media::Disk::headerless(media::DiskKind::AtariSD,0,img.len()).expect("bad disk");
        for blocks in [vec![],vec![0x41],vec![0x42],vec![0x43],vec![0x44],vec![0x41,0x42,0x43,0x44]] {
            let packed = compress(&img,&disk,Some(&blocks)).expect("encode failed");
            assert_eq!(decompress(&packed).expect("decode failed"),img);
        }
    }
}
