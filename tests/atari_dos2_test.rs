// test of Atari DOS 2 disks, built in memory
use a8kit::collection::Collection;
use a8kit::fs::dos2;
use a8kit::media::DiskKind;
use a8kit::segment::SegmentKind;

const GAME: [u8;15] = [0xff,0xff,0x00,0x06,0x02,0x06,0xa9,0x00,0x60,0xe0,0x02,0xe1,0x02,0x00,0x06];

fn pattern(len: usize,seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(3).wrapping_add(seed)).collect()
}

/// Fresh SD disk with five files
fn five_file_disk() -> Collection {
    let dat = dos2::create(DiskKind::AtariSD).expect("create failed");
    let mut collection = Collection::new("five.atr",&dat).expect("load failed");
    collection.write_file("A128.DAT",&pattern(128,1)).expect("write failed");
    collection.write_file("EMPTY",&[]).expect("write failed");
    collection.write_file("LONG.TXT",&pattern(1000,7)).expect("write failed");
    collection.write_file("GAME.XEX",&GAME).expect("write failed");
    collection.write_file("EXACT.BIN",&pattern(250,9)).expect("write failed");
    collection
}

#[test]
fn sd_disk_list() {
    let collection = five_file_disk();
    let c = &collection.containers[0];
    assert_eq!(c.media.disk().map(|d| d.kind),Some(DiskKind::AtariSD));
    assert_eq!(c.filesystem().map(|fs| fs.ui_name()),Some(dos2::UI_NAME));
    let names: Vec<String> = collection.iter_dirents().iter().map(|d| d.filename()).collect();
    assert_eq!(names,vec!["A128.DAT","EMPTY","LONG.TXT","GAME.XEX","EXACT.BIN"]);
    let sectors: Vec<usize> = collection.iter_dirents().iter().map(|d| d.num_sectors).collect();
    assert_eq!(sectors,vec![2,1,8,1,2]);
    assert!(collection.find_dirent("A128.DAT",true).is_ok());
    assert!(collection.find_dirent("a128.dat",true).is_err());
    assert!(collection.find_dirent("a128.dat",false).is_ok());
    assert!(collection.find_dirent("D1:a128.dat",false).is_ok());
    assert!(collection.find_dirent("D2:a128.dat",false).is_err());
}

#[test]
fn files_read_back() {
    let collection = five_file_disk();
    for (name,expected) in [("A128.DAT",pattern(128,1)),("EMPTY",vec![]),("LONG.TXT",pattern(1000,7)),("EXACT.BIN",pattern(250,9))] {
        let (c,d) = collection.find_dirent(name,true).expect("file not found");
        assert_eq!(c.read_file(d),expected,"{}",name);
    }
}

#[test]
fn catalog_lines() {
    let collection = five_file_disk();
    let fs = collection.containers[0].filesystem().expect("no filesystem");
    let lines = fs.catalog();
    assert_eq!(lines.len(),5);
    assert_eq!(lines[0],"File #0  (.2.u. ) 004 A128    DAT  002");
}

#[test]
fn executable_is_typed() {
    let collection = five_file_disk();
    let game = collection.iter_segments().into_iter()
        .find(|s| s.kind==SegmentKind::File && s.name=="GAME.XEX")
        .expect("no file segment");
    assert_eq!(game.segments.len(),2);
    assert_eq!(game.segments[0].segments[0].name,"[$0600-$0602]");
    assert_eq!(game.segments[0].segments[0].origin,0x600);
    assert_eq!(game.segments[1].segments[0].kind,SegmentKind::RunAddress);
}

#[test]
fn free_sector_accounting() {
    let dat = dos2::create(DiskKind::AtariSD).expect("create failed");
    let mut collection = Collection::new("acct.atr",&dat).expect("load failed");
    let free = |c: &Collection| c.containers[0].filesystem().and_then(|fs| fs.num_free_sectors());
    let vtoc_range = 16+359*128..16+360*128;
    let before = collection.containers[0].buffer.data[vtoc_range.clone()].to_vec();
    assert_eq!(free(&collection),Some(707));
    collection.write_file("TEMP.DAT",&pattern(600,3)).expect("write failed");
    assert_eq!(free(&collection),Some(702));
    collection.delete_file("temp.dat").expect("delete failed");
    assert_eq!(free(&collection),Some(707));
    assert!(collection.iter_dirents().is_empty());
    assert_eq!(collection.containers[0].buffer.data[vtoc_range].to_vec(),before);
    // the slot is flagged deleted
    assert_eq!(collection.containers[0].buffer.data[16+360*128],0x80);
    assert!(collection.delete_file("temp.dat").is_err());
}

#[test]
fn overwrite_reuses_slot() {
    let mut collection = five_file_disk();
    collection.write_file("long.txt",b"short now").expect("write failed");
    let (c,d) = collection.find_dirent("LONG.TXT",true).expect("file not found");
    assert_eq!(d.file_num,2);
    assert_eq!(d.num_sectors,1);
    assert_eq!(c.read_file(d),b"short now".to_vec());
    assert_eq!(collection.iter_dirents().len(),5);
}

#[test]
fn locked_file_is_kept() {
    let mut collection = five_file_disk();
    let c = &mut collection.containers[0];
    let flag_pos = c.find_dirent("LONG.TXT",true).expect("file not found").entry[0];
    c.buffer.data[flag_pos] |= 0x20;
    c.probe();
    let free = c.filesystem().and_then(|fs| fs.num_free_sectors());
    assert!(collection.write_file("LONG.TXT",b"replaced").is_err());
    assert!(collection.delete_file("LONG.TXT").is_err());
    let (c,d) = collection.find_dirent("LONG.TXT",true).expect("file not found");
    assert!(d.status().ends_with('*'));
    assert_eq!(c.read_file(d),pattern(1000,7));
    assert_eq!(c.filesystem().and_then(|fs| fs.num_free_sectors()),free);
}

#[test]
fn disk_full() {
    let dat = dos2::create(DiskKind::AtariSD).expect("create failed");
    let mut collection = Collection::new("full.atr",&dat).expect("load failed");
    assert!(collection.write_file("HUGE.DAT",&vec![0x55;708*125]).is_err());
    assert!(collection.iter_dirents().is_empty());
    assert!(collection.write_file("BAD NAME.TOOLONG",b"x").is_err());
}

#[test]
fn file_number_mismatch() {
    let mut collection = five_file_disk();
    let c = &mut collection.containers[0];
    let start = c.find_dirent("LONG.TXT",true).expect("file not found").starting_sector;
    let disk = c.media.disk().expect("not a disk").clone();
    let (pos,size) = disk.get_index_of_sector(start).expect("bad sector");
    // claim the sector belongs to file 5
    c.buffer.data[pos+size-3] = (5 << 2) | (c.buffer.data[pos+size-3] & 0x03);
    c.probe();
    let d = c.iter_dirents().into_iter().find(|d| d.basename=="LONG").expect("dirent not listed");
    assert!(!d.is_sane);
    assert!(!d.in_use);
    assert!(d.error.as_ref().expect("no error").starts_with("file number mismatch (164)"));
    // the dirent is listed but has no file segment
    let dirent_seg = c.iter_segments().into_iter()
        .find(|s| s.kind==SegmentKind::Dirent && s.name=="LONG.TXT")
        .expect("no dirent segment");
    assert!(dirent_seg.segments.is_empty());
    assert!(c.find_dirent("LONG.TXT",true).is_none());
}

#[test]
fn sector_loop_detected() {
    let mut collection = five_file_disk();
    let c = &mut collection.containers[0];
    let sectors = c.find_dirent("LONG.TXT",true).expect("file not found").sectors.clone();
    let start = sectors[0];
    let disk = c.media.disk().expect("not a disk").clone();
    let (pos,size) = disk.get_index_of_sector(sectors[1]).expect("bad sector");
    // second sector points back at the first
    c.buffer.data[pos+size-3] = (2 << 2) | ((start >> 8) as u8 & 0x03);
    c.buffer.data[pos+size-2] = (start & 0xff) as u8;
    c.probe();
    let d = c.iter_dirents().into_iter().find(|d| d.basename=="LONG").expect("dirent not listed");
    assert!(!d.is_sane);
    assert!(d.error.as_ref().expect("no error").contains("reread sector"));
}

#[test]
fn ed_disk_vtoc() {
    let dat = dos2::create(DiskKind::AtariED).expect("create failed");
    assert_eq!(dat.len(),133120+16);
    let mut collection = Collection::new("ed.atr",&dat).expect("load failed");
    let c = &collection.containers[0];
    assert_eq!(c.media.disk().map(|d| d.kind),Some(DiskKind::AtariED));
    let vtoc = c.iter_segments().into_iter().find(|s| s.kind==SegmentKind::Vtoc).expect("no vtoc");
    assert_eq!(vtoc.name,"DOS2 ED VTOC");
    assert_eq!(vtoc.len(),256);
    assert_eq!(vtoc.idx()[0],16+359*128);
    assert_eq!(vtoc.idx()[128],16+1023*128);
    assert_eq!(c.filesystem().and_then(|fs| fs.num_free_sectors()),Some(1011));
    // enough data to spill into sectors tracked by the second VTOC sector
    collection.write_file("BIG.DAT",&pattern(125*800,5)).expect("write failed");
    let c = &collection.containers[0];
    assert_eq!(c.filesystem().and_then(|fs| fs.num_free_sectors()),Some(211));
    let (c,d) = collection.find_dirent("BIG.DAT",true).expect("file not found");
    assert!(d.sectors.iter().any(|s| *s >= 720));
    assert_eq!(c.read_file(d),pattern(125*800,5));
    // DOS 2.5 reads the second VTOC sector's copy of the lower map and its own count
    let vtoc1 = 16+359*128;
    let vtoc2 = 16+1023*128;
    let data = &c.buffer.data;
    assert_eq!(data[vtoc2..vtoc2+0x54],data[vtoc1+0x10..vtoc1+0x64]);
    assert_eq!(data[vtoc1+3..vtoc1+5],[0,0]);
    assert_eq!(u16::from_le_bytes([data[vtoc2+0x7a],data[vtoc2+0x7b]]),211);
    collection.delete_file("BIG.DAT").expect("delete failed");
    let data = &collection.containers[0].buffer.data;
    assert_eq!(data[vtoc2..vtoc2+0x54],data[vtoc1+0x10..vtoc1+0x64]);
    assert_eq!(u16::from_le_bytes([data[vtoc1+3],data[vtoc1+4]]),707);
    assert_eq!(u16::from_le_bytes([data[vtoc2+0x7a],data[vtoc2+0x7b]]),304);
}

#[test]
fn dd_disk_round_trip() {
    let dat = dos2::create(DiskKind::AtariDD).expect("create failed");
    let mut collection = Collection::new("dd.atr",&dat).expect("load failed");
    collection.write_file("HELLO.TXT",&pattern(600,2)).expect("write failed");
    let saved = collection.save_to_bytes(false).expect("save failed");
    let reloaded = Collection::new("dd.atr",&saved).expect("reload failed");
    let (c,d) = reloaded.find_dirent("HELLO.TXT",true).expect("file not found");
    assert_eq!(d.num_sectors,3);
    assert_eq!(c.read_file(d),pattern(600,2));
}
