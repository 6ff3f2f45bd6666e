use std::io::{Cursor,Read,Write};
use ::zip::{ZipArchive,ZipWriter,CompressionMethod};
use ::zip::write::SimpleFileOptions;
use super::{Error,Member};

/// File members in central directory order, directories skipped
pub fn unpack(dat: &[u8]) -> Result<Vec<Member>,Error> {
    if !dat.starts_with(b"PK\x03\x04") {
        return Err(Error::InvalidArchiver("no zip local header".to_string()));
    }
    let mut archive = ZipArchive::new(Cursor::new(dat)).map_err(|e| Error::InvalidArchiver(format!("zip: {}",e)))?;
    let mut ans = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| Error::UnsupportedArchiver(format!("zip: {}",e)))?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        ans.push((name,buf));
    }
    Ok(ans)
}

pub fn pack(members: &[Member]) -> Result<Vec<u8>,Error> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name,dat) in members {
        writer.start_file(name.as_str(),options).map_err(|e| Error::UnsupportedArchiver(format!("zip: {}",e)))?;
        writer.write_all(dat)?;
    }
    let cursor = writer.finish().map_err(|e| Error::UnsupportedArchiver(format!("zip: {}",e)))?;
    Ok(cursor.into_inner())
}
