//! Decoder for unix `compress` (.Z) streams.
//!
//! Codes are packed LSB first, starting at 9 bits and growing to the max bits given in
//! the header.  Whenever the code width changes or the table is cleared, the reader skips
//! to the next boundary of a group of 8 codes, which is how the original encoder wrote them.

use log::trace;
use super::Error;

const CLEAR: usize = 256;

struct BitReader<'a> {
    src: &'a [u8],
    pos: usize
}

impl<'a> BitReader<'a> {
    fn read(&mut self,n: usize) -> Option<usize> {
        if self.pos + n > self.src.len() * 8 {
            return None;
        }
        let mut code = 0;
        for k in 0..n {
            let p = self.pos + k;
            if (self.src[p/8] >> (p%8)) & 1 == 1 {
                code |= 1 << k;
            }
        }
        self.pos += n;
        Some(code)
    }
    /// skip to the end of the current group of `bits` bytes measured from `mark`
    fn flush(&mut self,mark: &mut usize,bits: usize) {
        let mut consumed = (self.pos + 7) / 8;
        let rem = (consumed - *mark) % bits;
        if rem != 0 {
            consumed += bits - rem;
        }
        self.pos = consumed * 8;
        *mark = consumed;
    }
}

fn invalid(msg: &str) -> Error {
    Error::InvalidAlgorithm(format!("lzw: {}",msg))
}

pub fn decompress(dat: &[u8]) -> Result<Vec<u8>,Error> {
    if dat.len() < 3 || dat[0]!=0x1f || dat[1]!=0x9d {
        return Err(invalid("no signature"));
    }
    let flags = dat[2];
    if flags & 0x60 != 0 {
        return Err(invalid("unknown flags set"));
    }
    let mut max_bits = (flags & 0x1f) as usize;
    if max_bits < 9 || max_bits > 16 {
        return Err(invalid("bits out of range"));
    }
    if max_bits==9 {
        max_bits = 10;
    }
    let block_mode = flags & 0x80 != 0;
    let mut rdr = BitReader { src: &dat[3..], pos: 0 };
    let mut mark = 0;
    let mut bits = 9;
    let mut mask: usize = 0x1ff;
    let mut end: usize = match block_mode {
        true => 256,
        false => 255
    };
    let mut prefix = vec![0u16;1 << 16];
    let mut suffix = vec![0u8;1 << 16];
    let mut ans = Vec::new();
    let mut prev = match rdr.read(bits) {
        Some(c) => c,
        None => return Ok(ans)
    };
    if prev > 255 {
        return Err(invalid("bad first code"));
    }
    let mut last = prev as u8;
    ans.push(last);
    let mut stack: Vec<u8> = Vec::new();
    loop {
        if end >= mask && bits < max_bits {
            rdr.flush(&mut mark,bits);
            bits += 1;
            mask = (mask << 1) | 1;
            trace!("lzw: code width now {}",bits);
        }
        let code = match rdr.read(bits) {
            Some(c) => c,
            None => break
        };
        if code==CLEAR && block_mode {
            rdr.flush(&mut mark,bits);
            bits = 9;
            mask = 0x1ff;
            end = 255;
            continue;
        }
        let temp = code;
        let mut c = code;
        stack.clear();
        if c > end {
            if c != end + 1 || prev > end {
                return Err(invalid("bad code"));
            }
            stack.push(last);
            c = prev;
        }
        while c >= 256 {
            if stack.len() > 1 << 16 {
                return Err(invalid("code table loop"));
            }
            stack.push(suffix[c]);
            c = prefix[c] as usize;
        }
        stack.push(c as u8);
        last = c as u8;
        if end < mask {
            end += 1;
            prefix[end] = prev as u16;
            suffix[end] = last;
        }
        prev = temp;
        ans.extend(stack.iter().rev());
    }
    Ok(ans)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn table_reference() {
        // codes 65, 66, 257
        let dat = [0x1f,0x9d,0x90,0x41,0x84,0x04,0x04];
        assert_eq!(decompress(&dat).expect("decode failed"),b"ABAB".to_vec());
    }

    #[test]
    fn code_not_yet_in_table() {
        // codes 65, 257
        let dat = [0x1f,0x9d,0x90,0x41,0x02,0x02];
        assert_eq!(decompress(&dat).expect("decode failed"),b"AAA".to_vec());
    }

    #[test]
    fn rejects_bad_header() {
        assert!(decompress(&[0x1f,0x9d,0x05,0x00]).is_err());
        assert!(decompress(&[0x1f,0x8b,0x90,0x00]).is_err());
    }
}
