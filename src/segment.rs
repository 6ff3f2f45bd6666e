//! # Segments
//!
//! A `Segment` is a named, ordered view into a `Buffer`.  The view is an index array,
//! element `i` of the segment is `buffer.data[idx[i]]`.  Segments can be sliced or subset
//! further; the child's index array is always composed through the parent, so every segment
//! refers directly to buffer offsets no matter how deeply it is nested.
//!
//! Segments do not hold a reference to their buffer.  They carry the arena index of the
//! container that owns the buffer, and every read or write takes the buffer as an argument.
//! This allows any number of overlapping or aliasing segments to coexist with a single
//! mutable buffer.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use log::{debug,trace};
use crate::buffer::Buffer;
use crate::style_bits;
use crate::ranges;

/// Errors in building or addressing segments
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("buffer data is read only")]
    ReadOnlyContainer,
    #[error("segment length does not match data")]
    InvalidSegmentLength,
    #[error("segment indices are not unique")]
    InvalidSegmentOrder,
    #[error("invalid segment: {0}")]
    InvalidSegment(String)
}

/// Tags the role a segment plays in the tree
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash)]
pub enum SegmentKind {
    Raw,
    Header,
    Media,
    Boot,
    Vtoc,
    Directory,
    Dirent,
    TrackSectorList,
    File,
    ObjectSegment,
    RunAddress,
    InitAddress,
    User
}

impl fmt::Display for SegmentKind {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Raw => "raw",
            Self::Header => "header",
            Self::Media => "media",
            Self::Boot => "boot",
            Self::Vtoc => "vtoc",
            Self::Directory => "directory",
            Self::Dirent => "dirent",
            Self::TrackSectorList => "tslist",
            Self::File => "file",
            Self::ObjectSegment => "object",
            Self::RunAddress => "runad",
            Self::InitAddress => "initad",
            Self::User => "user"
        };
        write!(f,"{}",s)
    }
}

impl FromStr for SegmentKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        match s {
            "raw" => Ok(Self::Raw),
            "header" => Ok(Self::Header),
            "media" => Ok(Self::Media),
            "boot" => Ok(Self::Boot),
            "vtoc" => Ok(Self::Vtoc),
            "directory" => Ok(Self::Directory),
            "dirent" => Ok(Self::Dirent),
            "tslist" => Ok(Self::TrackSectorList),
            "file" => Ok(Self::File),
            "object" => Ok(Self::ObjectSegment),
            "runad" => Ok(Self::RunAddress),
            "initad" => Ok(Self::InitAddress),
            "user" => Ok(Self::User),
            _ => Err(Error::InvalidSegment(format!("unknown kind {}",s)))
        }
    }
}

/// Present when a segment is a run of whole sectors, used for labels
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub struct SectorRun {
    pub first_sector: usize,
    pub num_sectors: usize,
    pub sector_size: usize
}

/// Read only view of one of the buffer's arrays through a segment's index
pub struct View<'a> {
    arr: &'a [u8],
    idx: &'a [usize]
}

/// Mutable view of one of the buffer's arrays through a segment's index
pub struct ViewMut<'a> {
    arr: &'a mut [u8],
    idx: &'a [usize]
}

impl<'a> View<'a> {
    pub fn len(&self) -> usize {
        self.idx.len()
    }
    pub fn get(&self,i: usize) -> Option<u8> {
        self.idx.get(i).map(|j| self.arr[*j])
    }
    pub fn iter(&self) -> impl Iterator<Item=u8> + '_ {
        self.idx.iter().map(|j| self.arr[*j])
    }
    pub fn to_vec(&self) -> Vec<u8> {
        self.iter().collect()
    }
}

impl<'a> std::ops::Index<usize> for View<'a> {
    type Output = u8;
    fn index(&self,i: usize) -> &u8 {
        &self.arr[self.idx[i]]
    }
}

impl<'a> ViewMut<'a> {
    pub fn len(&self) -> usize {
        self.idx.len()
    }
    pub fn fill(&mut self,val: u8) {
        for j in self.idx {
            self.arr[*j] = val;
        }
    }
    pub fn or_all(&mut self,bits: u8) {
        for j in self.idx {
            self.arr[*j] |= bits;
        }
    }
    pub fn and_all(&mut self,mask: u8) {
        for j in self.idx {
            self.arr[*j] &= mask;
        }
    }
}

impl<'a> std::ops::Index<usize> for ViewMut<'a> {
    type Output = u8;
    fn index(&self,i: usize) -> &u8 {
        &self.arr[self.idx[i]]
    }
}

impl<'a> std::ops::IndexMut<usize> for ViewMut<'a> {
    fn index_mut(&mut self,i: usize) -> &mut u8 {
        &mut self.arr[self.idx[i]]
    }
}

#[derive(Debug,Clone)]
pub struct Segment {
    /// arena index of the container owning the buffer
    pub container: usize,
    idx: Vec<usize>,
    pub name: String,
    pub origin: usize,
    pub error: Option<String>,
    pub uuid: String,
    pub kind: SegmentKind,
    pub sectors: Option<SectorRun>,
    pub segments: Vec<Segment>,
    reverse: OnceCell<Option<HashMap<usize,usize>>>
}

pub fn new_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Segment {
    /// Contiguous view `[start,start+len)` of a buffer of length `buf_len`.
    /// Offsets past the end of the buffer are dropped.
    pub fn new(container: usize,buf_len: usize,start: usize,len: usize,origin: usize,name: &str) -> Self {
        let end = usize::min(start.saturating_add(len),buf_len);
        let idx: Vec<usize> = match start < end {
            true => (start..end).collect(),
            false => Vec::new()
        };
        Self::build(container,idx,origin,name)
    }
    /// View of an arbitrary ordered list of buffer offsets.
    /// Offsets past the end of the buffer are dropped.
    pub fn from_indexes(container: usize,buf_len: usize,idx: &[usize],origin: usize,name: &str) -> Self {
        let kept: Vec<usize> = idx.iter().filter(|i| **i < buf_len).copied().collect();
        if kept.len() < idx.len() {
            debug!("dropped {} offsets beyond buffer in {}",idx.len()-kept.len(),name);
        }
        Self::build(container,kept,origin,name)
    }
    fn build(container: usize,idx: Vec<usize>,origin: usize,name: &str) -> Self {
        Self {
            container,
            idx,
            name: name.to_string(),
            origin,
            error: None,
            uuid: new_uuid(),
            kind: SegmentKind::Raw,
            sectors: None,
            segments: Vec::new(),
            reverse: OnceCell::new()
        }
    }
    pub fn with_kind(mut self,kind: SegmentKind) -> Self {
        self.kind = kind;
        self
    }
    pub fn with_error(mut self,err: Option<String>) -> Self {
        self.error = err;
        self
    }
    pub fn with_sectors(mut self,first_sector: usize,num_sectors: usize,sector_size: usize) -> Self {
        self.sectors = Some(SectorRun { first_sector, num_sectors, sector_size });
        self
    }
    /// Contiguous sub-view.  The child's indices are this segment's `idx[start..start+len]`,
    /// truncated at this segment's end.
    pub fn slice(&self,start: usize,len: usize,origin: usize,name: &str) -> Segment {
        let end = usize::min(start.saturating_add(len),self.idx.len());
        let idx = match start < end {
            true => self.idx[start..end].to_vec(),
            false => Vec::new()
        };
        Self::build(self.container,idx,origin,name)
    }
    /// Ordered sub-view by local indices, which are composed through this segment.
    /// Local indices past this segment's end are dropped.
    pub fn subset(&self,local: &[usize],origin: usize,name: &str) -> Segment {
        let idx: Vec<usize> = local.iter().filter_map(|i| self.idx.get(*i).copied()).collect();
        Self::build(self.container,idx,origin,name)
    }
    pub fn len(&self) -> usize {
        self.idx.len()
    }
    pub fn is_empty(&self) -> bool {
        self.idx.is_empty()
    }
    /// The buffer offsets of this view
    pub fn idx(&self) -> &[usize] {
        &self.idx
    }
    pub fn is_valid_index(&self,i: usize) -> bool {
        i < self.idx.len()
    }
    pub fn get(&self,buf: &Buffer,i: usize) -> Option<u8> {
        self.idx.get(i).and_then(|j| buf.data.get(*j).copied())
    }
    /// Write through to the buffer
    pub fn set(&self,buf: &mut Buffer,i: usize,val: u8) -> Result<(),Error> {
        match self.idx.get(i) {
            Some(j) if *j < buf.data.len() => {
                buf.data[*j] = val;
                Ok(())
            },
            _ => Err(Error::InvalidSegment(format!("index {} outside {}",i,self.name)))
        }
    }
    pub fn get_u16_le(&self,buf: &Buffer,i: usize) -> Option<u16> {
        Some(u16::from_le_bytes([self.get(buf,i)?,self.get(buf,i+1)?]))
    }
    pub fn to_bytes(&self,buf: &Buffer) -> Vec<u8> {
        self.idx.iter().filter_map(|j| buf.data.get(*j).copied()).collect()
    }
    /// Write bytes at the local offset, the whole write must fit in the segment.
    pub fn write_bytes(&self,buf: &mut Buffer,offset: usize,bytes: &[u8]) -> Result<(),Error> {
        if offset + bytes.len() > self.idx.len() {
            return Err(Error::InvalidSegmentLength);
        }
        for i in 0..bytes.len() {
            self.set(buf,offset+i,bytes[i])?;
        }
        Ok(())
    }
    pub fn data<'a>(&'a self,buf: &'a Buffer) -> View<'a> {
        View { arr: &buf.data, idx: &self.idx }
    }
    pub fn data_mut<'a>(&'a self,buf: &'a mut Buffer) -> ViewMut<'a> {
        ViewMut { arr: &mut buf.data, idx: &self.idx }
    }
    pub fn style<'a>(&'a self,buf: &'a Buffer) -> View<'a> {
        View { arr: &buf.style, idx: &self.idx }
    }
    pub fn style_mut<'a>(&'a self,buf: &'a mut Buffer) -> ViewMut<'a> {
        ViewMut { arr: &mut buf.style, idx: &self.idx }
    }
    pub fn disasm_type<'a>(&'a self,buf: &'a Buffer) -> View<'a> {
        View { arr: &buf.disasm_type, idx: &self.idx }
    }
    pub fn disasm_type_mut<'a>(&'a self,buf: &'a mut Buffer) -> ViewMut<'a> {
        ViewMut { arr: &mut buf.disasm_type, idx: &self.idx }
    }
    /// Descendants in depth first pre-order, optionally filtered by kind
    pub fn iter_segments(&self,filter: Option<SegmentKind>) -> Vec<&Segment> {
        let mut ans = Vec::new();
        self.collect_segments(filter,&mut ans);
        ans
    }
    fn collect_segments<'a>(&'a self,filter: Option<SegmentKind>,ans: &mut Vec<&'a Segment>) {
        for s in &self.segments {
            if filter.is_none() || filter==Some(s.kind) {
                ans.push(s);
            }
            s.collect_segments(filter,ans);
        }
    }
    /// Descendants paired with their depth below this segment, starting at `level`
    pub fn iter_menu(&self,level: usize) -> Vec<(&Segment,usize)> {
        let mut ans = Vec::new();
        for s in &self.segments {
            ans.push((s,level));
            ans.append(&mut s.iter_menu(level+1));
        }
        ans
    }
    /// Visit this segment and all descendants in pre-order
    pub fn visit_mut(&mut self,f: &mut dyn FnMut(&mut Segment)) {
        f(self);
        for s in self.segments.iter_mut() {
            s.visit_mut(f);
        }
    }
    /// Descendant reached by following child positions
    pub fn get_by_path(&self,path: &[usize]) -> Option<&Segment> {
        match path.split_first() {
            None => Some(self),
            Some((first,rest)) => self.segments.get(*first)?.get_by_path(rest)
        }
    }
    pub fn get_by_path_mut(&mut self,path: &[usize]) -> Option<&mut Segment> {
        match path.split_first() {
            None => Some(self),
            Some((first,rest)) => self.segments.get_mut(*first)?.get_by_path_mut(rest)
        }
    }
    /// Map of buffer offset to local index, `None` if the index is not injective.
    /// Built on first use.
    pub fn reverse_index(&self) -> Option<&HashMap<usize,usize>> {
        self.reverse.get_or_init(|| {
            let mut map = HashMap::new();
            for (i,j) in self.idx.iter().enumerate() {
                if map.insert(*j,i).is_some() {
                    trace!("{} is not injective at buffer offset {}",self.name,j);
                    return None;
                }
            }
            Some(map)
        }).as_ref()
    }
    /// Local index of the buffer offset, if present in this segment
    pub fn get_index_from_base_index(&self,base: usize) -> Result<Option<usize>,Error> {
        match self.reverse_index() {
            Some(map) => Ok(map.get(&base).copied()),
            None => Err(Error::InvalidSegmentOrder)
        }
    }
    /// Map position `i` of `other` to a position in this segment through the shared buffer.
    /// Returns `None` if the byte is not in this segment or the segments use different buffers.
    pub fn calc_index_from_other_segment(&self,i: usize,other: &Segment) -> Result<Option<usize>,Error> {
        let base = match other.idx.get(i) {
            Some(j) => *j,
            None => return Err(Error::InvalidSegment(format!("index {} outside {}",i,other.name)))
        };
        if other.container != self.container {
            return Ok(None);
        }
        self.get_index_from_base_index(base)
    }
    pub fn set_comment_at(&self,buf: &mut Buffer,i: usize,text: &str) {
        if let Some(j) = self.idx.get(i) {
            buf.set_comment_at(*j,text);
        }
    }
    pub fn get_comment_at<'a>(&self,buf: &'a Buffer,i: usize) -> Option<&'a str> {
        self.idx.get(i).and_then(|j| buf.get_comment_at(*j))
    }
    pub fn remove_comment_at(&self,buf: &mut Buffer,i: usize) {
        if let Some(j) = self.idx.get(i) {
            buf.remove_comment_at(*j);
        }
    }
    /// Comments whose local index is in `[start,end)`, keyed by local index
    pub fn get_comments_in_range(&self,buf: &Buffer,start: usize,end: usize) -> Vec<(usize,String)> {
        let mut ans = Vec::new();
        let end = usize::min(end,self.idx.len());
        for i in start..end {
            if let Some(text) = buf.get_comment_at(self.idx[i]) {
                ans.push((i,text.to_string()));
            }
        }
        ans
    }
    /// All comments visible through this segment, keyed by local index
    pub fn iter_comments_in_segment(&self,buf: &Buffer) -> Vec<(usize,String)> {
        let mut ans = Vec::new();
        for (i,j) in self.idx.iter().enumerate() {
            if buf.style.get(*j).map_or(false,|b| style_bits::has(*b,style_bits::COMMENT)) {
                ans.push((i,buf.get_comment_at(*j).unwrap_or("").to_string()));
            }
        }
        ans
    }
    /// Set the diff style bit wherever this segment differs from `other`, which must
    /// view the same buffer.  Returns the number of differing bytes.
    pub fn compare_segment(&self,buf: &mut Buffer,other: &Segment) -> usize {
        let other_bytes = other.to_bytes(buf);
        self.compare_bytes(buf,&other_bytes)
    }
    /// Set the diff style bit wherever this segment differs from `other`.
    /// Bytes past the end of `other` count as different.
    pub fn compare_bytes(&self,buf: &mut Buffer,other: &[u8]) -> usize {
        let mut count = 0;
        for (i,j) in self.idx.iter().enumerate() {
            if *j >= buf.data.len() {
                continue;
            }
            let differs = match other.get(i) {
                Some(v) => *v != buf.data[*j],
                None => true
            };
            if differs {
                buf.style[*j] |= style_bits::DIFF;
                count += 1;
            } else {
                buf.style[*j] &= style_bits::mask(style_bits::DIFF);
            }
        }
        debug!("compare_segment: # entries {}, # diffs: {}",self.idx.len(),count);
        count
    }
    fn offsets_of_ranges(&self,ranges: &[(usize,usize)]) -> Vec<usize> {
        let mut ans = Vec::new();
        for (a,b) in ranges {
            let (start,end) = match a <= b {
                true => (*a,*b),
                false => (*b,*a)
            };
            let end = usize::min(end,self.idx.len());
            if start < end {
                ans.extend_from_slice(&self.idx[start..end]);
            }
        }
        ans
    }
    pub fn set_style_ranges(&self,buf: &mut Buffer,ranges: &[(usize,usize)],bits: u8) {
        buf.set_style_at_indexes(&self.offsets_of_ranges(ranges),bits);
    }
    pub fn clear_style_ranges(&self,buf: &mut Buffer,ranges: &[(usize,usize)],bits: u8) {
        buf.clear_style_at_indexes(&self.offsets_of_ranges(ranges),bits);
    }
    pub fn clear_style_bits(&self,buf: &mut Buffer,bits: u8) {
        buf.clear_style_at_indexes(&self.idx,bits);
    }
    /// Local ranges where all `bits` are set
    pub fn get_style_ranges(&self,buf: &Buffer,bits: u8) -> Vec<(usize,usize)> {
        let matches: Vec<bool> = self.idx.iter().map(|j| buf.style.get(*j).map_or(false,|b| style_bits::has(*b,bits))).collect();
        ranges::bool_to_ranges(&matches)
    }
    pub fn set_disasm_ranges(&self,buf: &mut Buffer,ranges: &[(usize,usize)],value: u8) {
        for j in self.offsets_of_ranges(ranges) {
            if let Some(t) = buf.disasm_type.get_mut(j) {
                *t = value;
            }
        }
    }
    pub fn address(&self,i: usize) -> String {
        format!("{:04x}",i + self.origin)
    }
    /// Sector style label for sector runs, otherwise the address
    pub fn label(&self,i: usize) -> String {
        match self.sectors {
            Some(run) if run.sector_size > 0 => {
                format!("s{:03}:{:02x}",i/run.sector_size + run.first_sector,i%run.sector_size)
            },
            _ => self.address(i)
        }
    }
    /// One line per segment in this subtree, indented by depth
    pub fn segment_info(&self,indent: &str) -> Vec<String> {
        let mut ans = vec![format!("{}{}",indent,self)];
        let next = [indent,"    "].concat();
        for s in &self.segments {
            ans.append(&mut s.segment_info(&next));
        }
        ans
    }
    /// Persisted form, buffer data is not included
    pub fn to_json(&self) -> json::JsonValue {
        let mut children = json::JsonValue::new_array();
        for s in &self.segments {
            let _ = children.push(s.to_json());
        }
        let mut ans = json::object! {
            "origin": self.origin,
            "name": self.name.clone(),
            "uuid": self.uuid.clone(),
            "kind": self.kind.to_string(),
            "container_offset": ranges::ranges_to_json(&ranges::collapse_to_ranges(&self.idx,true)),
            "segments": children
        };
        if let Some(err) = &self.error {
            ans["error"] = json::JsonValue::from(err.as_str());
        }
        ans
    }
    /// Rebuild a segment tree from its persisted form
    pub fn from_json(container: usize,buf_len: usize,obj: &json::JsonValue) -> Result<Self,Error> {
        let ranges = match ranges::ranges_from_json(&obj["container_offset"]) {
            Some(r) => r,
            None => return Err(Error::InvalidSegment("bad container_offset".to_string()))
        };
        let idx = ranges::restore_from_ranges(&ranges);
        let name = obj["name"].as_str().unwrap_or("");
        let origin = obj["origin"].as_usize().unwrap_or(0);
        let mut ans = Self::from_indexes(container,buf_len,&idx,origin,name);
        if let Some(uuid) = obj["uuid"].as_str() {
            ans.uuid = uuid.to_string();
        }
        if let Some(kind) = obj["kind"].as_str() {
            ans.kind = SegmentKind::from_str(kind)?;
        }
        ans.error = obj["error"].as_str().map(|s| s.to_string());
        for child in obj["segments"].members() {
            ans.segments.push(Self::from_json(container,buf_len,child)?);
        }
        Ok(ans)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sectors {
            Some(run) if run.num_sectors > 1 => write!(f,"{} (sectors {}-{})",self.name,run.first_sector,run.first_sector+run.num_sectors-1)?,
            Some(run) => write!(f,"{} (sector {})",self.name,run.first_sector)?,
            None if self.origin > 0 => write!(f,"{} ({} bytes @ {:04x})",self.name,self.idx.len(),self.origin)?,
            None => write!(f,"{} ({} bytes)",self.name,self.idx.len())?
        }
        if let Some(err) = &self.error {
            write!(f," {}",err)?;
        }
        Ok(())
    }
}
