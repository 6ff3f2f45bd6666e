//! Apple DOS binary files, as saved by `BSAVE`.
//! The first four bytes are the load address and the length.

use crate::buffer::Buffer;
use crate::fs::FileError;
use crate::segment::{Segment,SegmentKind};
use super::u16_at;

pub fn parse(buf: &Buffer,file: &Segment) -> Result<Option<Vec<Segment>>,FileError> {
    let b = file.to_bytes(buf);
    let (addr,len) = match (u16_at(&b,0),u16_at(&b,2)) {
        (Some(a),Some(l)) => (a,l),
        _ => return Ok(None)
    };
    if 4 + len > b.len() {
        return Err(FileError::InvalidBinaryFile(format!("length {} exceeds file size {}",len,b.len())));
    }
    let header = file.slice(0,4,0,"Binary Header");
    let name = match len {
        0 => format!("[${:04x}]",addr),
        _ => format!("[${:04x}-${:04x}]",addr,addr+len-1)
    };
    let body = file.slice(4,len,addr,&name).with_kind(SegmentKind::ObjectSegment);
    Ok(Some(vec![header,body]))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bsave() {
        let mut dat = vec![0x00,0x03,0x03,0x00,0xa9,0x00,0x60];
        dat.resize(256,0);
        let buf = Buffer::new(&dat);
        let seg = Segment::new(0,buf.len(),0,buf.len(),0,"BIN");
        let segs = parse(&buf,&seg).unwrap().unwrap();
        assert_eq!(segs[1].origin,0x300);
        assert_eq!(segs[1].name,"[$0300-$0302]");
        assert_eq!(segs[1].to_bytes(&buf),vec![0xa9,0x00,0x60]);
        let short = Buffer::new(&[0x00,0x03,0xff,0x00]);
        let seg = Segment::new(0,4,0,4,0,"BIN");
        assert!(parse(&short,&seg).is_err());
    }
}
