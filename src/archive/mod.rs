//! # Archive module
//!
//! An archive splits one file into members, each of which becomes a container.
//! `Plain` is the trivial archive of exactly one member.  Detection tries `REGISTRY`
//! in order and falls back to `Plain`.

mod tarball;
mod zipfile;

use std::fmt;
use std::str::FromStr;
use log::{debug,info};

#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("not this kind of archive: {0}")]
    InvalidArchiver(String),
    #[error("archive format not supported: {0}")]
    UnsupportedArchiver(String),
    #[error("plain archive holds one container, found {0}")]
    TooManyContainers(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error)
}

/// (member name,member bytes)
pub type Member = (String,Vec<u8>);

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum Archiver {
    Plain,
    Tar,
    Zip
}

pub const REGISTRY: [Archiver;2] = [Archiver::Zip,Archiver::Tar];

impl fmt::Display for Archiver {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{}",self.name())
    }
}

impl FromStr for Archiver {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "tar" => Ok(Self::Tar),
            "zip" => Ok(Self::Zip),
            _ => Err(Error::UnsupportedArchiver(s.to_string()))
        }
    }
}

impl Archiver {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Tar => "tar",
            Self::Zip => "zip"
        }
    }
    /// Split into members, `basename` names the single member of a plain archive
    pub fn unpack(&self,basename: &str,dat: &[u8]) -> Result<Vec<Member>,Error> {
        match self {
            Self::Plain => Ok(vec![(basename.to_string(),dat.to_vec())]),
            Self::Tar => tarball::unpack(dat),
            Self::Zip => zipfile::unpack(dat)
        }
    }
    pub fn pack(&self,members: &[Member]) -> Result<Vec<u8>,Error> {
        match self {
            Self::Plain => match members {
                [(_,dat)] => Ok(dat.clone()),
                _ => Err(Error::TooManyContainers(members.len()))
            },
            Self::Tar => tarball::pack(members),
            Self::Zip => zipfile::pack(members)
        }
    }
}

/// Try each archiver, the first that parses wins.  Never fails, plain is the fallback.
pub fn guess_archiver(basename: &str,dat: &[u8]) -> (Archiver,Vec<Member>) {
    for archiver in REGISTRY {
        match archiver.unpack(basename,dat) {
            Ok(members) => {
                info!("found {} archive with {} members",archiver,members.len());
                return (archiver,members);
            },
            Err(e) => debug!("{}: {}",archiver,e)
        }
    }
    (Archiver::Plain,vec![(basename.to_string(),dat.to_vec())])
}

#[cfg(test)]
mod test {
    use super::*;

    fn members() -> Vec<Member> {
        vec![("one.atr".to_string(),vec![1;300]),("two.atr".to_string(),vec![2;700])]
    }

    #[test]
    fn multi_member() {
        for archiver in REGISTRY {
            let packed = archiver.pack(&members()).expect("pack failed");
            let (found,unpacked) = guess_archiver("x",&packed);
            assert_eq!(found,archiver);
            assert_eq!(unpacked,members());
        }
    }

    #[test]
    fn plain() {
        let (found,unpacked) = guess_archiver("x",&[0;128]);
        assert_eq!(found,Archiver::Plain);
        assert_eq!(unpacked.len(),1);
        assert!(matches!(Archiver::Plain.pack(&members()),Err(Error::TooManyContainers(2))));
    }
}
