//! Atari DOS binary load files (XEX).
//!
//! The file is a sequence of load segments, each `start,end` followed by `end-start+1`
//! bytes.  The `FFFF` marker must begin the file and may be repeated before any segment.

use crate::buffer::Buffer;
use crate::fs::FileError;
use crate::segment::{Segment,SegmentKind};
use super::u16_at;

const RUNAD: usize = 0x2e0;
const INITAD: usize = 0x2e2;

/// Children for each load segment, or `None` if this is not an executable
pub fn parse(buf: &Buffer,file: &Segment) -> Result<Option<Vec<Segment>>,FileError> {
    let b = file.to_bytes(buf);
    if u16_at(&b,0) != Some(0xffff) {
        return Ok(None);
    }
    let mut segs: Vec<Segment> = Vec::new();
    let mut pos = 0;
    while pos < b.len() {
        let header = match u16_at(&b,pos) {
            Some(h) => h,
            None => {
                segs.push(file.slice(pos,1,0,"Incomplete Data"));
                break;
            }
        };
        if header==0xffff {
            pos += 2;
            continue;
        }
        let (start,end) = match (u16_at(&b,pos),u16_at(&b,pos+2)) {
            (Some(s),Some(e)) => (s,e),
            _ => {
                segs.push(file.slice(pos,b.len()-pos,0,"Short Segment Header"));
                break;
            }
        };
        if end < start {
            return Err(FileError::InvalidBinaryFile(format!("nonsensical start ${:04x} and end ${:04x}",start,end)));
        }
        let count = end - start + 1;
        if pos + 4 + count > b.len() {
            segs.push(file.slice(pos,b.len()-pos,start,"Incomplete Data").with_kind(SegmentKind::ObjectSegment));
            break;
        }
        let mut obj = file.slice(pos,4+count,0,&format!("Segment #{}",segs.len()+1)).with_kind(SegmentKind::ObjectSegment);
        let target = u16_at(&b,pos+4).unwrap_or(0);
        let child = match start {
            RUNAD if count >= 2 => obj.slice(4,2,start,&format!("RUNAD: JMP ${:04x}",target)).with_kind(SegmentKind::RunAddress),
            INITAD if count >= 2 => obj.slice(4,2,start,&format!("INITAD: JSR ${:04x}",target)).with_kind(SegmentKind::InitAddress),
            _ => obj.slice(4,count,start,&format!("[${:04x}-${:04x}]",start,end))
        };
        obj.segments.push(child);
        segs.push(obj);
        pos += 4 + count;
    }
    Ok(Some(segs))
}

#[cfg(test)]
mod test {
    use super::*;

    fn file_of(dat: &[u8]) -> (Buffer,Segment) {
        let buf = Buffer::new(dat);
        let seg = Segment::new(0,buf.len(),0,buf.len(),0,"TEST.XEX");
        (buf,seg)
    }

    #[test]
    fn load_and_run() {
        let (buf,seg) = file_of(&[0xff,0xff,0x00,0x06,0x02,0x06,0xa9,0x00,0x60,0xe0,0x02,0xe1,0x02,0x00,0x06]);
        let segs = parse(&buf,&seg).unwrap().expect("not xex");
        assert_eq!(segs.len(),2);
        assert_eq!(segs[0].name,"Segment #1");
        assert_eq!(segs[0].segments[0].name,"[$0600-$0602]");
        assert_eq!(segs[0].segments[0].origin,0x600);
        assert_eq!(segs[0].segments[0].to_bytes(&buf),vec![0xa9,0x00,0x60]);
        assert_eq!(segs[1].segments[0].name,"RUNAD: JMP $0600");
        assert_eq!(segs[1].segments[0].kind,SegmentKind::RunAddress);
    }

    #[test]
    fn damaged() {
        let (buf,seg) = file_of(&[0xff,0xff,0x00,0x06,0x10,0x06,0xa9]);
        let segs = parse(&buf,&seg).unwrap().unwrap();
        assert_eq!(segs[0].name,"Incomplete Data");
        let (buf,seg) = file_of(&[0xff,0xff,0x00,0x06]);
        let segs = parse(&buf,&seg).unwrap().unwrap();
        assert_eq!(segs[0].name,"Short Segment Header");
        let (buf,seg) = file_of(&[0xff,0xff,0x10,0x06,0x00,0x06]);
        assert!(parse(&buf,&seg).is_err());
        let (buf,seg) = file_of(b"HELLO");
        assert!(parse(&buf,&seg).unwrap().is_none());
    }
}
