use std::io::{Cursor,Read};
use super::{Error,Member};

const USTAR_OFFSET: usize = 257;

fn invalid(e: std::io::Error) -> Error {
    Error::InvalidArchiver(format!("tar: {}",e))
}

/// Regular file members in archive order
pub fn unpack(dat: &[u8]) -> Result<Vec<Member>,Error> {
    if dat.get(USTAR_OFFSET..USTAR_OFFSET+5) != Some(b"ustar".as_slice()) {
        return Err(Error::InvalidArchiver("no ustar magic".to_string()));
    }
    let mut archive = ::tar::Archive::new(Cursor::new(dat));
    let mut ans = Vec::new();
    for entry in archive.entries().map_err(invalid)? {
        let mut entry = entry.map_err(invalid)?;
        if entry.header().entry_type() != ::tar::EntryType::Regular {
            continue;
        }
        let name = entry.path().map_err(invalid)?.to_string_lossy().to_string();
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf).map_err(invalid)?;
        ans.push((name,buf));
    }
    if ans.is_empty() {
        return Err(Error::InvalidArchiver("tar has no regular files".to_string()));
    }
    Ok(ans)
}

pub fn pack(members: &[Member]) -> Result<Vec<u8>,Error> {
    let mut builder = ::tar::Builder::new(Vec::new());
    for (name,dat) in members {
        let mut header = ::tar::Header::new_ustar();
        header.set_size(dat.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(::tar::EntryType::Regular);
        builder.append_data(&mut header,name,dat.as_slice())?;
    }
    Ok(builder.into_inner()?)
}
