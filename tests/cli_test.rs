use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*; // Used for writing assertions
use std::process::Command; // Run programs
use std::path::Path;
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

const GAME: [u8;15] = [0xff,0xff,0x00,0x06,0x02,0x06,0xa9,0x00,0x60,0xe0,0x02,0xe1,0x02,0x00,0x06];

fn a8kit() -> Result<Command,Box<dyn std::error::Error>> {
    Ok(Command::cargo_bin("a8kit")?)
}

/// Blank SD disk with HELLO.TXT added, returns the image path
fn disk_with_hello(dir: &Path) -> Result<String,Box<dyn std::error::Error>> {
    let dimg = dir.join("test.atr").to_string_lossy().to_string();
    let host = dir.join("hello.txt");
    std::fs::write(&host,b"HELLO FROM THE HOST")?;
    a8kit()?.arg("create").arg(&dimg).assert().success();
    a8kit()?.arg("add").arg(&dimg).arg(&host).assert().success();
    Ok(dimg)
}

#[test]
fn create_and_list() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg = dir.path().join("blank.atr");
    a8kit()?.arg("create").arg(&dimg).arg("-t").arg("ed")
        .assert()
        .success()
        .stderr(predicate::str::contains("writing 133136 bytes"));
    a8kit()?.arg("list").arg(&dimg)
        .assert()
        .success()
        .stdout(predicate::str::contains("Atari ED (130K) Floppy Disk Image"))
        .stdout(predicate::str::contains("Atari DOS 2"))
        .stdout(predicate::str::contains("1011 free sectors"));
    Ok(())
}

#[test]
fn create_refuses_overwrite() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg = dir.path().join("blank.atr");
    a8kit()?.arg("create").arg(&dimg).assert().success();
    a8kit()?.arg("create").arg(&dimg)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
    a8kit()?.arg("create").arg(&dimg).arg("--force").arg("-t").arg("dd").assert().success();
    assert_eq!(std::fs::metadata(&dimg)?.len(),184320+16);
    a8kit()?.arg("create").arg(&dimg).arg("--force").arg("-t").arg("qd").assert().failure();
    Ok(())
}

#[test]
fn add_list_and_bare_path() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg = disk_with_hello(dir.path())?;
    a8kit()?.arg("ls").arg(&dimg)
        .assert()
        .success()
        .stdout(predicate::str::contains("File #0  (.2.u. ) 004 HELLO   TXT  001"))
        .stdout(predicate::str::contains("706 free sectors"));
    a8kit()?.arg(&dimg)
        .assert()
        .success()
        .stdout(predicate::str::contains("HELLO   TXT"));
    Ok(())
}

#[test]
fn add_to_copy() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg = disk_with_hello(dir.path())?;
    let copy = dir.path().join("copy.atr");
    let host = dir.path().join("more.dat");
    std::fs::write(&host,vec![0x55;300])?;
    a8kit()?.arg("add").arg(&dimg).arg(&host).arg("-o").arg(&copy).assert().success();
    a8kit()?.arg("list").arg(&copy)
        .assert()
        .success()
        .stdout(predicate::str::contains("MORE    DAT  003"));
    a8kit()?.arg("list").arg(&dimg)
        .assert()
        .success()
        .stdout(predicate::str::contains("MORE").not());
    Ok(())
}

#[test]
fn crc_of_file() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg = disk_with_hello(dir.path())?;
    let expected = format!("HELLO.TXT: {:08x}",crc32fast::hash(b"HELLO FROM THE HOST"));
    a8kit()?.arg("crc").arg(&dimg).arg("hello.txt")
        .assert()
        .success()
        .stdout(predicate::str::contains(expected));
    a8kit()?.arg("crc").arg(&dimg).arg("NOPE.TXT")
        .assert()
        .failure();
    Ok(())
}

#[test]
fn extract_and_dump() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg = disk_with_hello(dir.path())?;
    let out = dir.path().join("out");
    std::fs::create_dir(&out)?;
    a8kit()?.arg("extract").arg(&dimg).arg("HELLO.TXT").arg("-o").arg(&out).assert().success();
    assert_eq!(std::fs::read(out.join("HELLO.TXT"))?,b"HELLO FROM THE HOST".to_vec());
    a8kit()?.arg("x").arg(&dimg).arg("--dump")
        .assert()
        .success()
        .stdout(predicate::str::contains("0000 : 48 45 4C 4C 4F"))
        .stdout(predicate::str::contains("| HELLO FROM THE H"));
    Ok(())
}

#[test]
fn delete_restores_space() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg = disk_with_hello(dir.path())?;
    a8kit()?.arg("delete").arg(&dimg).arg("HELLO.TXT").assert().success();
    a8kit()?.arg("list").arg(&dimg)
        .assert()
        .success()
        .stdout(predicate::str::contains("HELLO").not())
        .stdout(predicate::str::contains("707 free sectors"));
    a8kit()?.arg("era").arg(&dimg).arg("HELLO.TXT")
        .assert()
        .failure()
        .stderr(predicate::str::contains("a8kit:"));
    Ok(())
}

#[test]
fn vtoc_map() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg = disk_with_hello(dir.path())?;
    a8kit()?.arg("vtoc").arg(&dimg)
        .assert()
        .success()
        .stdout(predicate::str::contains("DOS code: 2"))
        .stdout(predicate::str::contains("0000: XXXXX..."))
        .stdout(predicate::str::contains("706 free sectors"));
    Ok(())
}

#[test]
fn boot_image() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let xex = dir.path().join("game.xex");
    std::fs::write(&xex,GAME)?;
    let dimg = dir.path().join("game.atr");
    a8kit()?.arg("boot").arg(&xex).arg(&dimg).arg("--title").arg("My Game").assert().success();
    a8kit()?.arg("list").arg(&dimg)
        .assert()
        .success()
        .stdout(predicate::str::contains("Atari KBoot"))
        .stdout(predicate::str::contains("game    xex"));
    a8kit()?.arg("boot").arg(dir.path().join("hello.bin")).arg(dir.path().join("bad.atr"))
        .assert()
        .failure();
    let not_xex = dir.path().join("plain.bin");
    std::fs::write(&not_xex,b"not an executable")?;
    a8kit()?.arg("boot").arg(&not_xex).arg(dir.path().join("bad.atr"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("FFFF"));
    Ok(())
}

#[test]
fn segment_tree() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg = disk_with_hello(dir.path())?;
    a8kit()?.arg("segments").arg(&dimg)
        .assert()
        .success()
        .stdout(predicate::str::contains("compression: none"))
        .stdout(predicate::str::contains("filesystem: Atari DOS 2"))
        .stdout(predicate::str::contains("DOS2 SD VTOC"));
    Ok(())
}

#[test]
fn menu_session() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg = disk_with_hello(dir.path())?;
    let session = dir.path().join("test.json");
    a8kit()?.arg("menu").arg(&dimg).arg("--session").arg(&session).arg("--indent").arg("2")
        .assert()
        .success()
        .stdout(predicate::str::contains("DOS2 Directory"));
    let obj = json::parse(&std::fs::read_to_string(&session)?)?;
    assert_eq!(obj["archiver"],"plain");
    assert_eq!(obj["containers"].len(),1);
    let uuid = obj["containers"][0]["uuid"].as_str().unwrap_or("").to_string();
    assert_eq!(uuid.len(),36);
    a8kit()?.arg("segments").arg(&dimg).arg("--session").arg(&session)
        .assert()
        .success()
        .stdout(predicate::str::contains("HELLO.TXT"));
    let stale = dir.path().join("stale.json");
    std::fs::write(&stale,"{\"archiver\":\"zip\",\"containers\":[]}")?;
    a8kit()?.arg("segments").arg(&dimg).arg("--session").arg(&stale)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid session"));
    Ok(())
}

#[test]
fn missing_image() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    a8kit()?.arg("list").arg(dir.path().join("missing.atr"))
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("a8kit: "));
    Ok(())
}
