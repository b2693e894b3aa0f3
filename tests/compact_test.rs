// test of the compactor
use std::io::Cursor;
use cckdkit::image::CckdImage;
use cckdkit::dasd::{self,names,track,L2Table};
use cckdkit::dasd::codec::Kind;
use cckdkit::chkdsk::{chkdsk,CheckOptions};
use cckdkit::compact::{compact,CompactOutcome};

type Img = CckdImage<Cursor<Vec<u8>>>;

fn ckd_track(img: &Img,trk: u32) -> Vec<u8> {
    let data: Vec<u8> = (0..3000).map(|i| ((i * 3 + trk as usize) % 256) as u8).collect();
    track::build_ckd(&img.geo,trk,&[(b"".as_slice(),data.as_slice()),(b"K".as_slice(),b"R2".as_slice())]).expect("build failed")
}

fn add_track(img: &mut Img,trk: u32) {
    let image = ckd_track(img,trk);
    img.append_track(trk,Kind::Zlib,&image).expect("append failed");
}

fn new_3390(cyls: u32) -> Img {
    let dev = names::by_name("3390").expect("no 3390");
    CckdImage::create(Cursor::new(Vec::new()),dev,cyls,false,false,0).expect("create failed")
}

fn clean(img: &mut Img) -> bool {
    chkdsk(img,CheckOptions { level: 3, read_only: false }).expect("check failed").status()==0
}

#[test]
fn already_compact() {
    let mut img = new_3390(1);
    for trk in 0..8 {
        add_track(&mut img,trk);
    }
    let before = img.into_inner().into_inner();
    let mut img = CckdImage::open(Cursor::new(before.clone())).expect("open failed");
    assert_eq!(compact(&mut img).expect("compact failed"),CompactOutcome::NothingToDo);
    assert_eq!(img.into_inner().into_inner(),before);
}

#[test]
fn gaps_removed() {
    let mut img = new_3390(1);
    for trk in 0..4 {
        add_track(&mut img,trk);
    }
    img.append_gap(100).expect("gap failed");
    for trk in 4..8 {
        add_track(&mut img,trk);
    }
    img.append_gap(30).expect("gap failed");
    let old_size = img.file_len();
    match compact(&mut img).expect("compact failed") {
        CompactOutcome::Compacted { old_size: o, new_size, moved, dropped } => {
            assert_eq!(o,old_size);
            assert_eq!(new_size,old_size - 130);
            assert_eq!(moved,4);
            assert_eq!(dropped,0);
        },
        CompactOutcome::NothingToDo => panic!("nothing was done")
    }
    let mut img = CckdImage::open(img.into_inner()).expect("reopen failed");
    assert_eq!(img.file_len(),old_size - 130);
    assert!(clean(&mut img));
    for trk in 0..8 {
        assert_eq!(img.read_track(trk).expect("read failed"),ckd_track(&img,trk));
    }
    // second pass changes nothing
    let before = img.into_inner().into_inner();
    let mut img = CckdImage::open(Cursor::new(before.clone())).expect("open failed");
    assert_eq!(compact(&mut img).expect("compact failed"),CompactOutcome::NothingToDo);
    assert_eq!(img.into_inner().into_inner(),before);
}

#[test]
fn tables_moved_ahead_of_tracks() {
    // 20 cylinders need two level 2 tables, the second lands after track 0
    let mut img = new_3390(20);
    add_track(&mut img,0);
    add_track(&mut img,260);
    let l1 = img.read_l1().expect("no level 1");
    assert!(l1[1] > l1[0] + dasd::L2_TABLE_SIZE as u32);
    assert!(matches!(compact(&mut img).expect("compact failed"),CompactOutcome::Compacted { .. }));
    let mut img = CckdImage::open(img.into_inner()).expect("reopen failed");
    let l1 = img.read_l1().expect("no level 1");
    assert_eq!(l1[0] as u64,img.l1_end());
    assert_eq!(l1[1] as u64,img.l1_end() + dasd::L2_TABLE_SIZE);
    assert!(clean(&mut img));
    assert_eq!(img.read_track(0).expect("read failed"),ckd_track(&img,0));
    assert_eq!(img.read_track(260).expect("read failed"),ckd_track(&img,260));
}

#[test]
fn null_table_dropped() {
    let mut img = new_3390(20);
    add_track(&mut img,0);
    add_track(&mut img,260);
    let l1 = img.read_l1().expect("no level 1");
    img.write_l2(l1[1] as u64,&L2Table::null(false,0)).expect("write failed");
    match compact(&mut img).expect("compact failed") {
        CompactOutcome::Compacted { dropped, .. } => assert_eq!(dropped,1),
        CompactOutcome::NothingToDo => panic!("nothing was done")
    }
    let mut img = CckdImage::open(img.into_inner()).expect("reopen failed");
    let l1 = img.read_l1().expect("no level 1");
    assert_eq!(l1[1],dasd::L1_NULL);
    assert!(clean(&mut img));
    assert_eq!(img.read_track(260).expect("read failed"),track::null_image(&img.geo,260,0).expect("no null image"));
    assert_eq!(img.read_track(0).expect("read failed"),ckd_track(&img,0));
}
