// test of compressor detection and round trips through containers
use a8kit::compress::{self,Compressor,dcm};
use a8kit::collection::Collection;
use a8kit::media::{Disk,DiskKind};

/// Sector i is filled with i, then every 100th byte is 0xff
fn dcm_test_image() -> Vec<u8> {
    let mut ans = vec![0;720*128];
    for i in 0..720 {
        ans[i*128..(i+1)*128].fill(i as u8);
    }
    for i in (0..ans.len()).step_by(100) {
        ans[i] = 0xff;
    }
    ans
}

#[test]
fn dcm_round_trip() {
    let img = dcm_test_image();
    let disk = Disk::headerless(DiskKind::AtariSD,0,img.len()).expect("bad disk");
    let packed = dcm::compress(&img,&disk,None).expect("encode failed");
    assert!(packed.len() < img.len());
    assert_eq!(packed[0],0xfa);
    assert_eq!(dcm::decompress(&packed).expect("decode failed"),img);
}

#[test]
fn dcm_needs_standard_geometry() {
    let img = vec![1;800*128];
    let disk = Disk::headerless(DiskKind::AtariDDHardDrive,0,200*1024).expect("bad disk");
    assert!(dcm::compress(&img,&disk,None).is_err());
    assert!(Compressor::Dcm.compress(&img,None).is_err());
}

#[test]
fn layered_decompression() {
    let img = dcm_test_image();
    let disk = Disk::headerless(DiskKind::AtariSD,0,img.len()).expect("bad disk");
    let chain = vec![Compressor::Dcm,Compressor::Gzip];
    let packed = compress::compress_in_reverse_order(&img,&chain,Some(&disk),false).expect("compress failed");
    let (inner,found) = compress::guess_compressor_chain(&packed).expect("guess failed");
    assert_eq!(found,chain);
    assert_eq!(inner,img);

    // the collection keeps the chain with the container and can rebuild it
    let collection = Collection::new("image.dcm.gz",&packed).expect("load failed");
    assert_eq!(collection.containers.len(),1);
    let c = &collection.containers[0];
    assert_eq!(c.compressors,chain);
    assert_eq!(c.buffer.data,img);
    assert_eq!(c.media.disk().map(|d| d.kind),Some(DiskKind::AtariSD));
    let saved = collection.save_to_bytes(false).expect("save failed");
    let (again,found) = compress::guess_compressor_chain(&saved).expect("guess failed");
    assert_eq!(found,chain);
    assert_eq!(again,img);
}

#[test]
fn chain_round_trip_for_each_codec() {
    let dat: Vec<u8> = (0..5000).map(|i| ((i * 7) % 13) as u8).collect();
    for chain in [
        vec![Compressor::Xz],
        vec![Compressor::Lz4,Compressor::Bzip2],
        vec![Compressor::Zlib,Compressor::Gzip],
    ] {
        let packed = compress::compress_in_reverse_order(&dat,&chain,None,false).expect("compress failed");
        let (inner,found) = compress::guess_compressor_chain(&packed).expect("guess failed");
        assert_eq!(inner,dat);
        let repacked = compress::compress_in_reverse_order(&inner,&found,None,false).expect("compress failed");
        assert_eq!(compress::decompress_chain(&repacked,&found).expect("decompress failed"),dat);
    }
}

#[test]
fn names_are_stable() {
    for c in compress::REGISTRY {
        let back: Compressor = c.name().parse().expect("name did not parse");
        assert_eq!(back,c);
    }
    assert!("snappy".parse::<Compressor>().is_err());
}
