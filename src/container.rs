//! # Container
//!
//! A container is one logical image: the decompressed bytes in a `Buffer`, the
//! compressor chain that produced them, and the media and filesystem found in them.
//! The container also holds the top level segments, `[header?,media]`, where the media
//! segment's children are the filesystem's boot, VTOC, and directory segments.

use std::collections::BTreeMap;
use std::path::Path;
use log::{debug,info};
use crate::buffer::Buffer;
use crate::compress::{self,Compressor};
use crate::file_types::{self,FileHint};
use crate::fs::{self,Dirent};
use crate::media::{self,Media,Layout};
use crate::segment::{self,Segment,SegmentKind,new_uuid};

pub struct Container {
    /// position in the collection, also the arena index stored in segments
    pub index: usize,
    pub pathname: String,
    pub buffer: Buffer,
    /// innermost first
    pub compressors: Vec<Compressor>,
    pub media: Media,
    pub segments: Vec<Segment>,
    pub uuid: String,
    pub origin: usize,
    pub memory_map: BTreeMap<usize,String>
}

impl Container {
    /// Peel compression off `dat`, then probe for media and filesystem
    pub fn new(index: usize,pathname: &str,dat: &[u8]) -> Result<Self,compress::Error> {
        let (inner,chain) = compress::guess_compressor_chain(dat)?;
        Ok(Self::from_payload(index,pathname,&inner,chain))
    }
    /// Container over already decompressed bytes
    pub fn from_payload(index: usize,pathname: &str,dat: &[u8],compressors: Vec<Compressor>) -> Self {
        let buffer = Buffer::new(dat);
        let media = Media::raw(index,buffer.len());
        let mut ans = Self {
            index,
            pathname: pathname.to_string(),
            buffer,
            compressors,
            media,
            segments: Vec::new(),
            uuid: new_uuid(),
            origin: 0,
            memory_map: BTreeMap::new()
        };
        ans.probe();
        ans
    }
    /// File name without directories or extension, used to name synthesized files
    pub fn basename(&self) -> String {
        match Path::new(&self.pathname).file_stem() {
            Some(s) => s.to_string_lossy().to_string(),
            None => String::new()
        }
    }
    /// Run media and filesystem detection and rebuild the segment tree
    pub fn probe(&mut self) {
        let mut media = media::guess_media_type(self.index,&self.buffer);
        media.filesystem = fs::guess_filesystem(&media,&self.buffer,&self.basename());
        self.media = media;
        self.segments = self.build_segments();
        self.annotate();
    }
    fn build_segments(&self) -> Vec<Segment> {
        let mut ans = Vec::new();
        if let Some(h) = self.media.header_segment() {
            ans.push(h);
        }
        let mut top = self.media.segment();
        match (&self.media.filesystem,&self.media.layout) {
            (Some(fs),_) => top.segments = fs.segments(&self.buffer),
            (None,Layout::Cart(cart)) => top.segments = cart.segments(self.index,self.buffer.len()),
            (None,_) => {
                let file = top.slice(0,top.len(),0,&self.basename()).with_kind(SegmentKind::File);
                top.segments.push(file_types::guess_file_type(&self.buffer,file,FileHint::Plain));
            }
        }
        ans.push(top);
        ans
    }
    /// Comment the filesystem structures
    pub fn annotate(&mut self) {
        if let Some(fs) = &self.media.filesystem {
            let comments = fs.comments();
            debug!("adding {} filesystem comments",comments.len());
            for (offset,text) in comments {
                self.buffer.set_comment_at(offset,&text);
            }
        }
    }
    pub fn filesystem(&self) -> Option<&dyn fs::Filesystem> {
        self.media.filesystem.as_deref()
    }
    /// Bytes that load back into the same logical image
    pub fn calc_packed_bytes(&self,skip_missing: bool) -> Result<Vec<u8>,compress::Error> {
        compress::compress_in_reverse_order(&self.buffer.data,&self.compressors,self.media.disk(),skip_missing)
    }
    pub fn write_file(&mut self,filename: &str,dat: &[u8]) -> Result<(),fs::Error> {
        match &self.media.filesystem {
            Some(fs) => fs.write_file(&mut self.buffer,filename,dat)?,
            None => return Err(fs::Error::Unsupported("media without a filesystem".to_string()))
        }
        info!("wrote {} ({} bytes) to {}",filename,dat.len(),self.pathname);
        self.probe();
        Ok(())
    }
    pub fn delete_file(&mut self,filename: &str) -> Result<(),fs::Error> {
        match &self.media.filesystem {
            Some(fs) => fs.delete_file(&mut self.buffer,filename)?,
            None => return Err(fs::Error::Unsupported("media without a filesystem".to_string()))
        }
        info!("deleted {} from {}",filename,self.pathname);
        self.probe();
        Ok(())
    }
    /// Depth first pre-order over the whole tree
    pub fn iter_segments(&self) -> Vec<&Segment> {
        let mut ans = Vec::new();
        for s in &self.segments {
            ans.push(s);
            ans.append(&mut s.iter_segments(None));
        }
        ans
    }
    pub fn iter_dirents(&self) -> Vec<&Dirent> {
        match &self.media.filesystem {
            Some(fs) => fs.dirents().iter().collect(),
            None => Vec::new()
        }
    }
    pub fn find_dirent(&self,name: &str,match_case: bool) -> Option<&Dirent> {
        self.media.filesystem.as_ref().and_then(|fs| fs.find_dirent(name,match_case))
    }
    pub fn read_file(&self,dirent: &Dirent) -> Vec<u8> {
        dirent.read(&self.buffer)
    }
    pub fn is_bootable(&self) -> bool {
        self.media.is_bootable(&self.buffer)
    }
    pub fn verbose_info(&self) -> Vec<String> {
        let chain: Vec<&str> = self.compressors.iter().map(|c| c.name()).collect();
        let mut ans = vec![
            format!("{}: {}",self.pathname,self.media),
            format!("    compression: {}",chain.join(",")),
            format!("    filesystem: {}",match self.filesystem() {
                Some(fs) => fs.ui_name(),
                None => "none"
            })
        ];
        for s in &self.segments {
            ans.append(&mut s.segment_info("    "));
        }
        ans
    }
    pub fn to_json(&self) -> json::JsonValue {
        let mut compressors = json::JsonValue::new_array();
        for c in &self.compressors {
            let _ = compressors.push(c.name());
        }
        let mut memory_map = json::JsonValue::new_array();
        for (addr,label) in &self.memory_map {
            let _ = memory_map.push(json::array![*addr,label.as_str()]);
        }
        let mut segments = json::JsonValue::new_array();
        for s in &self.segments {
            let _ = segments.push(s.to_json());
        }
        json::object! {
            "name": self.pathname.clone(),
            "uuid": self.uuid.clone(),
            "origin": self.origin,
            "compressors": compressors,
            "memory_map": memory_map,
            "buffer": self.buffer.to_json(),
            "segments": segments
        }
    }
    /// Apply a persisted form to a freshly probed container.  Session segments are matched
    /// to the derived segments by name and index array, matches take the session's UUID and
    /// origin.  Unmatched session segments are kept as user segments under the media.
    pub fn restore_json(&mut self,obj: &json::JsonValue) -> Result<(),segment::Error> {
        if let Some(uuid) = obj["uuid"].as_str() {
            self.uuid = uuid.to_string();
        }
        self.origin = obj["origin"].as_usize().unwrap_or(0);
        self.memory_map.clear();
        for item in obj["memory_map"].members() {
            if let (Some(addr),Some(label)) = (item[0].as_usize(),item[1].as_str()) {
                self.memory_map.insert(addr,label.to_string());
            }
        }
        if !obj["buffer"].is_null() && !self.buffer.restore_json(&obj["buffer"]) {
            return Err(segment::Error::InvalidSegment("malformed buffer annotations".to_string()));
        }
        let mut saved = Vec::new();
        for item in obj["segments"].members() {
            flatten(Segment::from_json(self.index,self.buffer.len(),item)?,&mut saved);
        }
        let mut matched = vec![false;saved.len()];
        for top in self.segments.iter_mut() {
            top.visit_mut(&mut |seg: &mut Segment| {
                let found = saved.iter().enumerate().position(|(i,s)| !matched[i] && s.name==seg.name && s.idx()==seg.idx());
                if let Some(i) = found {
                    matched[i] = true;
                    seg.uuid = saved[i].uuid.clone();
                    seg.origin = saved[i].origin;
                }
            });
        }
        let user: Vec<Segment> = saved.into_iter().zip(matched).filter(|(_,m)| !m).map(|(s,_)| s.with_kind(SegmentKind::User)).collect();
        debug!("restored {} user segments",user.len());
        if let Some(media) = self.segments.iter_mut().find(|s| s.kind==SegmentKind::Media) {
            media.segments.extend(user);
        }
        Ok(())
    }
}

/// Pre-order list of the tree with children detached
fn flatten(mut seg: Segment,ans: &mut Vec<Segment>) {
    let children = std::mem::take(&mut seg.segments);
    ans.push(seg);
    for c in children {
        flatten(c,ans);
    }
}
