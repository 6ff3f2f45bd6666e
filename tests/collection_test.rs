// test of multi-disk archives, saving, and sessions
use a8kit::archive::Archiver;
use a8kit::collection::Collection;
use a8kit::compress::{self,Compressor};
use a8kit::fs::{dos2,kboot};
use a8kit::media::DiskKind;
use a8kit::segment::SegmentKind;

const GAME: [u8;15] = [0xff,0xff,0x00,0x06,0x02,0x06,0xa9,0x00,0x60,0xe0,0x02,0xe1,0x02,0x00,0x06];

/// SD disk with one file, a KBoot image, and a blank ED disk
fn members() -> Vec<(String,Vec<u8>)> {
    let sd = dos2::create(DiskKind::AtariSD).expect("create failed");
    let mut first = Collection::new("disk1.atr",&sd).expect("load failed");
    first.write_file("README.TXT",b"three disks").expect("write failed");
    vec![
        ("disk1.atr".to_string(),first.save_to_bytes(false).expect("save failed")),
        ("game.atr".to_string(),kboot::create_kboot_image(&GAME,Some("game"),None).expect("kboot failed")),
        ("disk3.atr".to_string(),dos2::create(DiskKind::AtariED).expect("create failed"))
    ]
}

fn zip_collection() -> Collection {
    let packed = Archiver::Zip.pack(&members()).expect("pack failed");
    Collection::new("disks.zip",&packed).expect("load failed")
}

#[test]
fn zip_of_three() {
    let collection = zip_collection();
    assert_eq!(collection.archiver,Archiver::Zip);
    assert_eq!(collection.containers.len(),3);
    let kinds: Vec<Option<DiskKind>> = collection.containers.iter().map(|c| c.media.disk().map(|d| d.kind)).collect();
    assert_eq!(kinds,vec![Some(DiskKind::AtariSD),Some(DiskKind::AtariSDShort),Some(DiskKind::AtariED)]);
    let fs_names: Vec<&str> = collection.containers.iter().filter_map(|c| c.filesystem()).map(|fs| fs.ui_name()).collect();
    assert_eq!(fs_names,vec![dos2::UI_NAME,kboot::UI_NAME,dos2::UI_NAME]);
    let names: Vec<String> = collection.iter_dirents().iter().map(|d| d.filename()).collect();
    assert_eq!(names,vec!["README.TXT","game.xex"]);
}

#[test]
fn disk_prefix() {
    let collection = zip_collection();
    let (c,d) = collection.find_dirent("README.TXT",true).expect("file not found");
    assert_eq!(c.index,0);
    assert_eq!(c.read_file(d),b"three disks".to_vec());
    let (c,d) = collection.find_dirent("D2:GAME.XEX",false).expect("file not found");
    assert_eq!(c.index,1);
    assert_eq!(c.read_file(d),GAME.to_vec());
    assert!(collection.find_dirent("D2:README.TXT",true).is_err());
    assert!(collection.find_dirent("D4:README.TXT",true).is_err());
    assert!(collection.find_dirent("D0:README.TXT",true).is_err());
    assert_eq!(collection.parse_file_spec("d3:foo").expect("bad spec"),(2,"foo".to_string()));
    assert_eq!(collection.find_container("D3").map(|c| c.pathname.as_str()),Some("disk3.atr"));
}

#[test]
fn write_and_reload() {
    let mut collection = zip_collection();
    collection.write_file("D3:NEW.DAT",&[7;300]).expect("write failed");
    assert!(collection.write_file("D5:NEW.DAT",&[7;300]).is_err());
    let saved = collection.save_to_bytes(false).expect("save failed");
    let reloaded = Collection::new("disks.zip",&saved).expect("reload failed");
    assert_eq!(reloaded.containers.len(),3);
    let (_,d) = reloaded.find_dirent("D3:NEW.DAT",true).expect("file not found");
    assert_eq!(d.num_sectors,3);
    assert_eq!(reloaded.containers[2].filesystem().and_then(|fs| fs.num_free_sectors()),Some(1008));
    assert!(reloaded.find_dirent("README.TXT",true).is_ok());
}

#[test]
fn compressed_tar() {
    let tar = Archiver::Tar.pack(&members()).expect("pack failed");
    let packed = compress::compress_in_reverse_order(&tar,&[Compressor::Gzip],None,false).expect("compress failed");
    let collection = Collection::new("disks.tar.gz",&packed).expect("load failed");
    assert_eq!(collection.archiver,Archiver::Tar);
    assert_eq!(collection.compressors,vec![Compressor::Gzip]);
    assert_eq!(collection.containers.len(),3);
    let saved = collection.save_to_bytes(false).expect("save failed");
    let (inner,chain) = compress::guess_compressor_chain(&saved).expect("guess failed");
    assert_eq!(chain,vec![Compressor::Gzip]);
    let reloaded = Collection::new("disks.tar",&inner).expect("reload failed");
    assert_eq!(reloaded.archiver,Archiver::Tar);
    assert!(reloaded.find_dirent("D2:game.xex",true).is_ok());
}

#[test]
fn boot_media() {
    let collection = zip_collection();
    assert!(!collection.containers[0].is_bootable());
    assert!(collection.containers[1].is_bootable());
    let boot = collection.find_boot_media().expect("no boot media");
    assert_eq!(boot.kind,SegmentKind::Media);
    let media = collection.containers[1].segments.iter().find(|s| s.kind==SegmentKind::Media).expect("no media");
    assert_eq!(boot.uuid,media.uuid);
}

#[test]
fn uuid_lookup() {
    let collection = zip_collection();
    for seg in collection.iter_segments() {
        let found = collection.find_uuid(&seg.uuid).expect("uuid not found");
        assert_eq!(found.name,seg.name);
        assert_eq!(found.idx(),seg.idx());
    }
    assert!(collection.find_uuid("not-a-uuid").is_none());
}

#[test]
fn session_round_trip() {
    let dat = Archiver::Zip.pack(&members()).expect("pack failed");
    let mut collection = Collection::new("disks.zip",&dat).expect("load failed");
    collection.containers[0].buffer.set_comment_at(100,"boot code starts here");
    collection.containers[0].memory_map.insert(0x600,"PAGE6".to_string());
    let media_pos = collection.containers[2].segments.iter().position(|s| s.kind==SegmentKind::Media).expect("no media");
    let mine = collection.containers[2].segments[media_pos].slice(0,128,0x700,"my boot sector");
    collection.containers[2].segments[media_pos].segments.push(mine);
    let uuids: Vec<String> = collection.iter_segments().iter().map(|s| s.uuid.clone()).collect();

    let session = json::parse(&json::stringify(collection.serialize_session())).expect("bad json");
    assert_eq!(session["archiver"],"zip");
    let restored = Collection::restore_session("disks.zip",&dat,&session).expect("restore failed");
    let restored_uuids: Vec<String> = restored.iter_segments().iter().map(|s| s.uuid.clone()).collect();
    assert_eq!(restored_uuids,uuids);
    assert_eq!(restored.containers[0].buffer.get_comment_at(100),Some("boot code starts here"));
    assert_eq!(restored.containers[0].memory_map.get(&0x600).map(|s| s.as_str()),Some("PAGE6"));
    assert_eq!(restored.containers[0].uuid,collection.containers[0].uuid);
    let user = restored.iter_segments().into_iter().find(|s| s.name=="my boot sector").expect("user segment lost");
    assert_eq!(user.kind,SegmentKind::User);
    assert_eq!(user.origin,0x700);
    assert_eq!(user.len(),128);

    // the session belongs to the zip, not to a lone disk
    let single = dos2::create(DiskKind::AtariSD).expect("create failed");
    assert!(Collection::restore_session("one.atr",&single,&session).is_err());
}

#[test]
fn empty_file() {
    assert!(Collection::new("nothing.atr",&[]).is_err());
}
