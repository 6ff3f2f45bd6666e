//! # Collection
//!
//! The top level object.  A collection is one file on the host: optionally compressed,
//! optionally an archive, holding one or more containers.  Loading runs the full
//! detection cascade:
//!
//! bytes → outer compressor chain → archive members → per member compressor chain →
//! media → filesystem.
//!
//! Saving reverses every step.  A session is the JSON form of everything except the raw
//! bytes, which are supplied again from the file when the session is restored.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::path::Path;
use log::{debug,info};
use regex::Regex;
use crate::archive::{self,Archiver};
use crate::compress::{self,Compressor};
use crate::container::Container;
use crate::fs::{self,Dirent};
use crate::segment::{self,Segment};

#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("unsupported disk image: {0}")]
    UnsupportedDiskImage(String),
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("invalid session: {0}")]
    InvalidSession(String),
    #[error(transparent)]
    Compress(#[from] compress::Error),
    #[error(transparent)]
    Archive(#[from] archive::Error),
    #[error(transparent)]
    Filesystem(#[from] fs::Error),
    #[error(transparent)]
    Segment(#[from] segment::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error)
}

/// Position of a segment: container, index in the container's top level, path below that
type SegmentPath = (usize,usize,Vec<usize>);

pub struct Collection {
    pub pathname: String,
    pub archiver: Archiver,
    /// compression around the archive, innermost first
    pub compressors: Vec<Compressor>,
    pub containers: Vec<Container>,
    uuid_map: OnceCell<HashMap<String,SegmentPath>>
}

fn collect_paths(seg: &Segment,path: Vec<usize>,root: (usize,usize),map: &mut HashMap<String,SegmentPath>) {
    for (i,child) in seg.segments.iter().enumerate() {
        let mut p = path.clone();
        p.push(i);
        collect_paths(child,p.clone(),root,map);
        map.insert(child.uuid.clone(),(root.0,root.1,p));
    }
}

impl Collection {
    pub fn new(pathname: &str,dat: &[u8]) -> Result<Self,Error> {
        if dat.is_empty() {
            return Err(Error::UnsupportedDiskImage(format!("{} is empty",pathname)));
        }
        let (outer,mut compressors) = match compress::guess_compressor_chain(dat) {
            Ok(x) => x,
            Err(compress::Error::UnsupportedAlgorithm(msg)) => return Err(Error::UnsupportedDiskImage(msg)),
            Err(e) => return Err(Error::Compress(e))
        };
        let basename = match Path::new(pathname).file_name() {
            Some(s) => s.to_string_lossy().to_string(),
            None => pathname.to_string()
        };
        let (archiver,members) = archive::guess_archiver(&basename,&outer);
        let mut containers = Vec::new();
        match archiver {
            Archiver::Plain => {
                // a lone image keeps its compression with the container, where the disk layout is known
                let (name,bytes) = &members[0];
                containers.push(Container::from_payload(0,name,bytes,compressors));
                compressors = vec![Compressor::None];
            },
            _ => {
                for (i,(name,bytes)) in members.iter().enumerate() {
                    let c = match Container::new(i,name,bytes) {
                        Ok(c) => c,
                        Err(compress::Error::UnsupportedAlgorithm(msg)) => return Err(Error::UnsupportedDiskImage(format!("{}: {}",name,msg))),
                        Err(e) => return Err(Error::Compress(e))
                    };
                    containers.push(c);
                }
            }
        }
        info!("{}: {} archive with {} containers",pathname,archiver,containers.len());
        Ok(Self {
            pathname: pathname.to_string(),
            archiver,
            compressors,
            containers,
            uuid_map: OnceCell::new()
        })
    }
    pub fn iter_containers(&self) -> impl Iterator<Item=&Container> {
        self.containers.iter()
    }
    /// Container by disk label `Dn`, numbered from 1
    pub fn find_container(&self,label: &str) -> Option<&Container> {
        let n = label.strip_prefix('D').or(label.strip_prefix('d'))?.parse::<usize>().ok()?;
        match n {
            0 => None,
            _ => self.containers.get(n-1)
        }
    }
    fn container_index(&self,label: &str) -> Result<usize,Error> {
        match self.find_container(label) {
            Some(c) => Ok(c.index),
            None => Err(Error::FileNotFound(format!("disk {} not in {}",label,self.pathname)))
        }
    }
    /// Depth first across all containers
    pub fn iter_segments(&self) -> Vec<&Segment> {
        self.containers.iter().flat_map(|c| c.iter_segments()).collect()
    }
    pub fn iter_dirents(&self) -> Vec<&Dirent> {
        self.containers.iter().flat_map(|c| c.iter_dirents()).collect()
    }
    /// Split `[Dn:]name` into the container index and the file name, the default disk is D1
    pub fn parse_file_spec(&self,spec: &str) -> Result<(usize,String),Error> {
        let re = Regex::new(r"^(?:([Dd][0-9]+):)?(.+)$").map_err(|e| Error::FileNotFound(e.to_string()))?;
        match re.captures(spec) {
            Some(caps) => {
                let idx = match caps.get(1) {
                    Some(label) => self.container_index(label.as_str())?,
                    None => self.container_index("D1")?
                };
                Ok((idx,caps[2].to_string()))
            },
            None => Err(Error::FileNotFound(spec.to_string()))
        }
    }
    /// Find a file by `[Dn:]name`
    pub fn find_dirent(&self,spec: &str,match_case: bool) -> Result<(&Container,&Dirent),Error> {
        let (idx,name) = self.parse_file_spec(spec)?;
        let container = &self.containers[idx];
        match container.find_dirent(&name,match_case) {
            Some(d) => Ok((container,d)),
            None => Err(Error::FileNotFound(spec.to_string()))
        }
    }
    pub fn find_uuid(&self,uuid: &str) -> Option<&Segment> {
        let map = self.uuid_map.get_or_init(|| {
            let mut map = HashMap::new();
            for c in &self.containers {
                for (i,top) in c.segments.iter().enumerate() {
                    map.insert(top.uuid.clone(),(c.index,i,Vec::new()));
                    collect_paths(top,Vec::new(),(c.index,i),&mut map);
                }
            }
            debug!("uuid map has {} entries",map.len());
            map
        });
        let (c,top,path) = map.get(uuid)?;
        self.containers.get(*c)?.segments.get(*top)?.get_by_path(path)
    }
    /// Media segment of the first bootable container, else the first segment with an origin
    pub fn find_boot_media(&self) -> Option<&Segment> {
        for c in &self.containers {
            if c.is_bootable() {
                return c.segments.iter().find(|s| s.kind==segment::SegmentKind::Media);
            }
        }
        self.iter_segments().into_iter().find(|s| s.origin > 0)
    }
    /// Write a file into container `Dn`, the spec is `[Dn:]name`
    pub fn write_file(&mut self,spec: &str,dat: &[u8]) -> Result<(),Error> {
        let (idx,name) = self.parse_file_spec(spec)?;
        self.containers[idx].write_file(&name,dat)?;
        self.uuid_map = OnceCell::new();
        Ok(())
    }
    pub fn delete_file(&mut self,spec: &str) -> Result<(),Error> {
        let (idx,name) = self.parse_file_spec(spec)?;
        self.containers[idx].delete_file(&name)?;
        self.uuid_map = OnceCell::new();
        Ok(())
    }
    pub fn save_to_bytes(&self,skip_missing: bool) -> Result<Vec<u8>,Error> {
        let mut members = Vec::new();
        for c in &self.containers {
            members.push((c.pathname.clone(),c.calc_packed_bytes(skip_missing)?));
        }
        let packed = self.archiver.pack(&members)?;
        Ok(compress::compress_in_reverse_order(&packed,&self.compressors,None,skip_missing)?)
    }
    /// Save to `path`, or back to the original path
    pub fn save(&self,path: Option<&str>,skip_missing: bool) -> Result<(),Error> {
        let dat = self.save_to_bytes(skip_missing)?;
        let dest = path.unwrap_or(&self.pathname);
        std::fs::write(dest,dat)?;
        info!("saved {}",dest);
        Ok(())
    }
    pub fn serialize_session(&self) -> json::JsonValue {
        let mut compressors = json::JsonValue::new_array();
        for c in &self.compressors {
            let _ = compressors.push(c.name());
        }
        let mut containers = json::JsonValue::new_array();
        for c in &self.containers {
            let _ = containers.push(c.to_json());
        }
        json::object! {
            "pathname": self.pathname.clone(),
            "name": match Path::new(&self.pathname).file_name() {
                Some(s) => s.to_string_lossy().to_string(),
                None => self.pathname.clone()
            },
            "archiver": self.archiver.name(),
            "compressors": compressors,
            "containers": containers
        }
    }
    /// Load `dat` and apply the session to it.  The archive must produce the containers
    /// the session describes.
    pub fn restore_session(pathname: &str,dat: &[u8],session: &json::JsonValue) -> Result<Self,Error> {
        let mut ans = Self::new(pathname,dat)?;
        if session["archiver"].as_str() != Some(ans.archiver.name()) {
            return Err(Error::InvalidSession(format!("archiver mismatch, file is {}",ans.archiver)));
        }
        if session["containers"].len() != ans.containers.len() {
            return Err(Error::InvalidSession(format!("session has {} containers, file has {}",session["containers"].len(),ans.containers.len())));
        }
        for (c,obj) in ans.containers.iter_mut().zip(session["containers"].members()) {
            c.restore_json(obj).map_err(|e| Error::InvalidSession(e.to_string()))?;
        }
        Ok(ans)
    }
    pub fn verbose_info(&self) -> Vec<String> {
        let chain: Vec<&str> = self.compressors.iter().map(|c| c.name()).collect();
        let mut ans = vec![format!("{}: {} archive, compression {}",self.pathname,self.archiver,chain.join(","))];
        for c in &self.containers {
            ans.append(&mut c.verbose_info());
        }
        ans
    }
}
