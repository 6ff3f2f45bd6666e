//! # Buffer
//!
//! The `Buffer` owns the bytes of one logical image along with the parallel
//! style and disassembler-type arrays and a sparse map of comments.  Segments never
//! copy out of the buffer, they hold index arrays that are resolved against it.
//!
//! The data is write-once: a buffer is either created with its data, or created
//! unpopulated and filled exactly once with `populate`.  Individual bytes can be changed
//! at any time.

use std::collections::BTreeMap;
use log::{debug,info,warn};
use crate::style_bits;
use crate::ranges;
use crate::segment::Error;

pub const DEFAULT_DISASM_TYPE: u8 = 128;

#[derive(Clone,Debug)]
pub struct Buffer {
    pub data: Vec<u8>,
    pub style: Vec<u8>,
    pub disasm_type: Vec<u8>,
    comments: BTreeMap<usize,String>,
    populated: bool
}

impl Buffer {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
            style: vec![0;bytes.len()],
            disasm_type: vec![DEFAULT_DISASM_TYPE;bytes.len()],
            comments: BTreeMap::new(),
            populated: true
        }
    }
    /// Buffer of the given length whose data will be supplied later
    pub fn unpopulated(len: usize) -> Self {
        let mut ans = Self::new(&vec![0;len]);
        ans.populated = false;
        ans
    }
    /// Set the data of an unpopulated buffer
    pub fn populate(&mut self,bytes: &[u8]) -> Result<(),Error> {
        if self.populated {
            return Err(Error::ReadOnlyContainer);
        }
        if bytes.len() != self.data.len() {
            return Err(Error::InvalidSegmentLength);
        }
        self.data.copy_from_slice(bytes);
        self.populated = true;
        Ok(())
    }
    pub fn is_populated(&self) -> bool {
        self.populated
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn set_style_at_indexes(&mut self,idx: &[usize],bits: u8) {
        for i in idx {
            if *i < self.style.len() {
                self.style[*i] |= bits;
            }
        }
    }
    pub fn clear_style_at_indexes(&mut self,idx: &[usize],bits: u8) {
        let mask = style_bits::mask(bits);
        for i in idx {
            if *i < self.style.len() {
                self.style[*i] &= mask;
            }
        }
    }
    /// Ranges `[start,end)` of buffer offsets where all of `bits` are set
    pub fn get_style_ranges(&self,bits: u8) -> Vec<(usize,usize)> {
        let matches: Vec<bool> = self.style.iter().map(|s| style_bits::has(*s,bits)).collect();
        ranges::bool_to_ranges(&matches)
    }
    /// Set a comment, an empty string removes it.  Offsets outside the buffer are ignored.
    pub fn set_comment_at(&mut self,offset: usize,text: &str) {
        if offset >= self.data.len() {
            warn!("comment offset {} is outside the buffer",offset);
            return;
        }
        if text.len()==0 {
            self.remove_comment_at(offset);
            return;
        }
        self.comments.insert(offset,text.to_string());
        self.style[offset] |= style_bits::COMMENT;
    }
    pub fn get_comment_at(&self,offset: usize) -> Option<&str> {
        self.comments.get(&offset).map(|s| s.as_str())
    }
    pub fn remove_comment_at(&mut self,offset: usize) {
        self.comments.remove(&offset);
        if offset < self.style.len() {
            self.style[offset] &= style_bits::mask(style_bits::COMMENT);
        }
    }
    /// Comments in ascending offset order
    pub fn iter_comments(&self) -> impl Iterator<Item=(usize,&str)> {
        self.comments.iter().map(|(k,v)| (*k,v.as_str()))
    }
    pub fn num_comments(&self) -> usize {
        self.comments.len()
    }
    /// Make the comment style bits agree with the comment map.  Returns the number of
    /// offsets that were repaired.
    pub fn fixup_comments(&mut self) -> usize {
        let mut fixed = 0;
        // drop out of range or empty comments
        let bad: Vec<usize> = self.comments.iter()
            .filter(|(k,v)| **k >= self.data.len() || v.len()==0)
            .map(|(k,_)| *k).collect();
        for k in bad {
            self.comments.remove(&k);
            fixed += 1;
        }
        for i in 0..self.style.len() {
            let has_comment = self.comments.contains_key(&i);
            let has_bit = style_bits::has(self.style[i],style_bits::COMMENT);
            if has_comment && !has_bit {
                self.style[i] |= style_bits::COMMENT;
                fixed += 1;
            } else if !has_comment && has_bit {
                self.style[i] &= style_bits::mask(style_bits::COMMENT);
                fixed += 1;
            }
        }
        if fixed > 0 {
            info!("fixed {} comment inconsistencies",fixed);
        }
        fixed
    }
    /// Set the data style bit wherever the disassembler type marks data
    pub fn update_data_style_from_disasm_type(&mut self) {
        for i in 0..self.disasm_type.len() {
            let t = self.disasm_type[i];
            if t==0 || (t >= 30 && t < 128) {
                self.style[i] |= style_bits::DATA;
            } else {
                self.style[i] &= style_bits::mask(style_bits::DATA);
            }
        }
    }
    /// Persisted form excluding the data itself
    pub fn to_json(&self) -> json::JsonValue {
        let mut comments = json::JsonValue::new_array();
        for (offset,text) in self.iter_comments() {
            let _ = comments.push(json::array![offset,text]);
        }
        json::object! {
            "len": self.data.len(),
            "comments": comments,
            "style": ranges::values_to_json(&ranges::collapse_values(&self.style)),
            "disasm_type": ranges::values_to_json(&ranges::collapse_values(&self.disasm_type))
        }
    }
    /// Apply comments, style and disassembler types from the persisted form.
    /// Returns false if the form is malformed, in which case nothing is changed.
    pub fn restore_json(&mut self,obj: &json::JsonValue) -> bool {
        let style = match ranges::values_from_json(&obj["style"]) {
            Some(s) => s,
            None => return false
        };
        let disasm = match ranges::values_from_json(&obj["disasm_type"]) {
            Some(d) => d,
            None => return false
        };
        let mut comments = Vec::new();
        for item in obj["comments"].members() {
            match (item[0].as_usize(),item[1].as_str()) {
                (Some(offset),Some(text)) => comments.push((offset,text.to_string())),
                _ => return false
            }
        }
        ranges::restore_values(&mut self.style,&style);
        ranges::restore_values(&mut self.disasm_type,&disasm);
        self.comments.clear();
        for (offset,text) in comments {
            if offset < self.data.len() {
                self.comments.insert(offset,text);
            } else {
                debug!("dropping comment at {}",offset);
            }
        }
        self.fixup_comments();
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn write_once() {
        let mut buf = Buffer::unpopulated(4);
        assert!(buf.populate(&[1,2,3]).is_err());
        assert!(buf.populate(&[1,2,3,4]).is_ok());
        assert!(matches!(buf.populate(&[1,2,3,4]),Err(Error::ReadOnlyContainer)));
        buf.data[0] = 9;
        assert_eq!(buf.data,vec![9,2,3,4]);
    }

    #[test]
    fn comment_bits_follow_comments() {
        let mut buf = Buffer::new(&[0;16]);
        buf.set_comment_at(3,"hello");
        buf.set_comment_at(99,"ignored");
        assert_eq!(buf.style[3],style_bits::COMMENT);
        assert_eq!(buf.get_comment_at(3),Some("hello"));
        buf.style[5] |= style_bits::COMMENT;
        assert_eq!(buf.fixup_comments(),1);
        assert_eq!(buf.style[5],0);
        buf.remove_comment_at(3);
        assert_eq!(buf.style[3],0);
        assert_eq!(buf.num_comments(),0);
    }

    #[test]
    fn data_style_from_disasm() {
        let mut buf = Buffer::new(&[0;4]);
        buf.disasm_type = vec![0,30,127,128];
        buf.update_data_style_from_disasm_type();
        assert_eq!(buf.get_style_ranges(style_bits::DATA),vec![(0,3)]);
    }

    #[test]
    fn persisted_form() {
        let mut buf = Buffer::new(&[0;32]);
        buf.set_comment_at(10,"ten");
        buf.set_style_at_indexes(&[1,2,3],style_bits::SELECTED);
        buf.disasm_type[20] = 5;
        let obj = buf.to_json();
        let mut other = Buffer::new(&[0;32]);
        assert!(other.restore_json(&obj));
        assert_eq!(other.style,buf.style);
        assert_eq!(other.disasm_type,buf.disasm_type);
        assert_eq!(other.get_comment_at(10),Some("ten"));
    }
}
