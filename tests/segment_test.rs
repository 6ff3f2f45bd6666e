// test of the buffer and segment views
use a8kit::buffer::Buffer;
use a8kit::segment::{Segment,SegmentKind};
use a8kit::style_bits;

fn counting_buffer(n: usize) -> Buffer {
    let dat: Vec<u8> = (0..n).map(|i| i as u8).collect();
    Buffer::new(&dat)
}

#[test]
fn nested_views_compose() {
    let mut buf = counting_buffer(256);
    let top = Segment::new(0,buf.len(),16,128,0x2000,"top");
    let mid = top.slice(8,32,0x2008,"mid");
    let odd = mid.subset(&[1,3,5,7,100],0,"odd");
    assert_eq!(mid.idx()[0],24);
    assert_eq!(odd.idx(),&[25,27,29,31]);
    assert_eq!(odd.to_bytes(&buf),vec![25,27,29,31]);
    // writes go through to the buffer and are seen by every view
    odd.set(&mut buf,2,0xaa).expect("write failed");
    assert_eq!(buf.data[29],0xaa);
    assert_eq!(mid.get(&buf,5),Some(0xaa));
    assert_eq!(top.get(&buf,13),Some(0xaa));
    assert!(odd.set(&mut buf,4,0).is_err());
}

#[test]
fn reordered_view() {
    let buf = counting_buffer(32);
    let rev: Vec<usize> = (0..32).rev().collect();
    let seg = Segment::from_indexes(0,buf.len(),&rev,0,"reversed");
    assert_eq!(seg.get(&buf,0),Some(31));
    assert_eq!(seg.get_index_from_base_index(0).expect("not injective"),Some(31));
    let other = Segment::new(0,buf.len(),4,4,0,"other");
    assert_eq!(seg.calc_index_from_other_segment(1,&other).expect("bad index"),Some(26));
}

#[test]
fn comments_through_views() {
    let mut buf = counting_buffer(64);
    let seg = Segment::new(0,buf.len(),10,20,0,"code");
    seg.set_comment_at(&mut buf,3,"entry point");
    assert_eq!(buf.get_comment_at(13),Some("entry point"));
    assert!(buf.style[13] & style_bits::COMMENT > 0);
    assert_eq!(seg.iter_comments_in_segment(&buf),vec![(3,"entry point".to_string())]);
    assert!(seg.get_comments_in_range(&buf,0,3).is_empty());
    seg.remove_comment_at(&mut buf,3);
    assert_eq!(buf.num_comments(),0);
    assert_eq!(buf.style[13] & style_bits::COMMENT,0);
}

#[test]
fn comment_fixup() {
    let mut buf = counting_buffer(16);
    buf.set_comment_at(4,"kept");
    buf.style[9] |= style_bits::COMMENT;
    assert_eq!(buf.fixup_comments(),1);
    assert_eq!(buf.get_style_ranges(style_bits::COMMENT),vec![(4,5)]);
    assert_eq!(buf.fixup_comments(),0);
}

#[test]
fn style_ranges_are_local() {
    let mut buf = counting_buffer(64);
    let seg = Segment::new(0,buf.len(),32,16,0,"data");
    seg.set_style_ranges(&mut buf,&[(2,4),(10,12)],style_bits::SELECTED);
    assert_eq!(buf.get_style_ranges(style_bits::SELECTED),vec![(34,36),(42,44)]);
    assert_eq!(seg.get_style_ranges(&buf,style_bits::SELECTED),vec![(2,4),(10,12)]);
    seg.clear_style_ranges(&mut buf,&[(3,11)],style_bits::SELECTED);
    assert_eq!(seg.get_style_ranges(&buf,style_bits::SELECTED),vec![(2,3),(11,12)]);
}

#[test]
fn disasm_type_sets_data_style() {
    let mut buf = counting_buffer(8);
    let seg = Segment::new(0,buf.len(),2,4,0,"table");
    seg.set_disasm_ranges(&mut buf,&[(0,2)],30);
    buf.update_data_style_from_disasm_type();
    assert_eq!(buf.get_style_ranges(style_bits::DATA),vec![(2,4)]);
}

#[test]
fn compare_marks_differences() {
    let mut buf = counting_buffer(32);
    let a = Segment::new(0,buf.len(),0,8,0,"a");
    let b = Segment::new(0,buf.len(),8,8,0,"b");
    assert_eq!(a.compare_segment(&mut buf,&b),8);
    assert_eq!(a.compare_bytes(&mut buf,&[0,1,2,3,4,5,6]),1);
    assert_eq!(a.get_style_ranges(&buf,style_bits::DIFF),vec![(7,8)]);
}

#[test]
fn buffer_populates_once() {
    let mut buf = Buffer::unpopulated(4);
    assert!(!buf.is_populated());
    assert!(buf.populate(&[1,2,3]).is_err());
    buf.populate(&[1,2,3,4]).expect("populate failed");
    assert_eq!(buf.data,vec![1,2,3,4]);
    assert!(buf.populate(&[1,2,3,4]).is_err());
}

#[test]
fn json_round_trip() {
    let mut buf = counting_buffer(300);
    let mut top = Segment::new(0,buf.len(),0,300,0,"media").with_kind(SegmentKind::Media);
    let sparse = top.subset(&[5,6,7,100,101,250],0x600,"sparse").with_kind(SegmentKind::User);
    top.segments.push(sparse);
    top.segments[0].error = Some("odd".to_string());
    buf.set_comment_at(101,"hello");
    buf.set_style_at_indexes(&[7,8,9],style_bits::user_bits(5));
    let seg_json = json::parse(&json::stringify(top.to_json())).expect("bad json");
    let buf_json = json::parse(&json::stringify(buf.to_json())).expect("bad json");

    let back = Segment::from_json(0,300,&seg_json).expect("restore failed");
    assert_eq!(back.uuid,top.uuid);
    assert_eq!(back.kind,SegmentKind::Media);
    assert_eq!(back.segments[0].idx(),&[5,6,7,100,101,250]);
    assert_eq!(back.segments[0].origin,0x600);
    assert_eq!(back.segments[0].error,Some("odd".to_string()));

    let mut fresh = counting_buffer(300);
    assert!(fresh.restore_json(&buf_json));
    assert_eq!(fresh.get_comment_at(101),Some("hello"));
    assert_eq!(fresh.style,buf.style);
    assert_eq!(fresh.disasm_type,buf.disasm_type);
}

#[test]
fn tree_navigation() {
    let buf = counting_buffer(64);
    let mut top = Segment::new(0,buf.len(),0,64,0,"top");
    let mut child = top.slice(0,32,0,"child");
    let grandchild = child.slice(0,8,0,"grandchild");
    child.segments.push(grandchild);
    let second = top.slice(32,32,0,"second");
    top.segments.push(child);
    top.segments.push(second);
    let names: Vec<&str> = top.iter_segments(None).iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names,vec!["child","grandchild","second"]);
    let menu: Vec<usize> = top.iter_menu(0).iter().map(|(_,level)| *level).collect();
    assert_eq!(menu,vec![0,1,0]);
    assert_eq!(top.get_by_path(&[0,0]).map(|s| s.name.as_str()),Some("grandchild"));
    assert!(top.get_by_path(&[2]).is_none());
    assert_eq!(top.segment_info("").len(),4);
}
