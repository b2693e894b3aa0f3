// test of the image checker on images built in memory
use std::io::Cursor;
use cckdkit::image::{CckdImage,FreeList};
use cckdkit::dasd::{self,names,track,Error,L2Entry};
use cckdkit::dasd::codec::Kind;
use cckdkit::chkdsk::{chkdsk,status_of,CheckOptions,CheckReport};

type Img = CckdImage<Cursor<Vec<u8>>>;

fn track_data(trk: u32) -> Vec<u8> {
    (0..2000).map(|i| ((i * 7 + trk as usize * 13) % 251) as u8).collect()
}

fn ckd_track(img: &Img,trk: u32) -> Vec<u8> {
    let data = track_data(trk);
    track::build_ckd(&img.geo,trk,&[(b"KEY1".as_slice(),data.as_slice())]).expect("build failed")
}

fn add_tracks_with(img: &mut Img,kind: Kind,trks: std::ops::Range<u32>) {
    for trk in trks {
        let image = ckd_track(img,trk);
        img.append_track(trk,kind,&image).expect("append failed");
    }
}

fn add_tracks(img: &mut Img,trks: std::ops::Range<u32>) {
    add_tracks_with(img,Kind::Zlib,trks);
}

/// 3390 with one cylinder, i.e. 15 tracks
fn ckd_image_with(kind: Kind,tracks: u32) -> Img {
    let dev = names::by_name("3390").expect("no 3390");
    let mut img = CckdImage::create(Cursor::new(Vec::new()),dev,1,false,false,0).expect("create failed");
    add_tracks_with(&mut img,kind,0..tracks);
    img
}

fn ckd_image(tracks: u32) -> Img {
    ckd_image_with(Kind::Zlib,tracks)
}

fn zero_first_table(img: &mut Img) {
    let l1 = img.read_l1().expect("no level 1");
    img.write_bytes(l1[0] as u64,&vec![0;dasd::L2_TABLE_SIZE as usize],"zero table").expect("write failed");
}

fn run(img: &mut Img,level: i32) -> CheckReport {
    chkdsk(img,CheckOptions { level, read_only: false }).expect("check failed")
}

fn reopen(img: Img) -> Img {
    CckdImage::open(img.into_inner()).expect("reopen failed")
}

fn assert_tracks(img: &mut Img,trks: std::ops::Range<u32>) {
    for trk in trks {
        let expected = ckd_track(img,trk);
        assert_eq!(img.read_track(trk).expect("read failed"),expected,"track {}",trk);
    }
}

#[test]
fn fresh_image_is_clean() {
    let mut img = ckd_image(10);
    for level in -1..=3 {
        let report = run(&mut img,level);
        assert_eq!(report.status(),0,"level {}",level);
        assert_eq!(report.level,level);
    }
}

#[test]
fn trailing_gap_is_truncated() {
    let mut img = ckd_image(10);
    let len = img.file_len();
    img.append_gap(50).expect("gap failed");
    let report = run(&mut img,0);
    assert_eq!(report.status(),1);
    assert_eq!(report.level,1);
    let mut img = reopen(img);
    assert_eq!(img.file_len(),len);
    assert_eq!(img.cdevhdr.size as u64,len);
    assert_eq!(run(&mut img,1).status(),0);
    assert_tracks(&mut img,0..10);
}

#[test]
fn free_space_array() {
    let mut img = ckd_image(5);
    let gap = img.append_gap(50).expect("gap failed");
    add_tracks(&mut img,5..10);
    assert_eq!(run(&mut img,1).status(),1);
    let mut img = reopen(img);
    assert_eq!(img.cdevhdr.free as u64,gap);
    assert_eq!(img.cdevhdr.free_total,50);
    assert_eq!(img.cdevhdr.free_largest,50);
    assert_eq!(img.cdevhdr.free_number,1);
    assert_eq!(img.read_free_list().expect("no list"),FreeList::Array(gap,vec![(gap,50)]));
    assert_eq!(run(&mut img,3).status(),0);
    assert_tracks(&mut img,0..10);
}

#[test]
fn free_space_chain() {
    let mut img = ckd_image(5);
    let gap = img.append_gap(10).expect("gap failed");
    add_tracks(&mut img,5..10);
    assert_eq!(run(&mut img,1).status(),1);
    let mut img = reopen(img);
    assert_eq!(img.read_free_list().expect("no list"),FreeList::Chain(vec![(gap,10)]));
    assert_eq!(run(&mut img,1).status(),0);
}

#[test]
fn small_gap_absorbed() {
    let mut img = ckd_image(5);
    img.append_gap(4).expect("gap failed");
    add_tracks(&mut img,5..10);
    assert_eq!(run(&mut img,1).status(),1);
    let mut img = reopen(img);
    assert_eq!(img.cdevhdr.free,0);
    assert_eq!(img.cdevhdr.free_imbed,4);
    assert_eq!(img.cdevhdr.free_total,4);
    let (_,entry) = img.l2_entry(4).expect("read failed").expect("no table");
    assert_eq!(entry.size,entry.len + 4);
    assert_eq!(run(&mut img,3).status(),0);
    assert_tracks(&mut img,0..10);
}

#[test]
fn lost_table_is_recovered() {
    let mut img = ckd_image(10);
    zero_first_table(&mut img);
    let report = run(&mut img,0);
    assert_eq!(report.status(),2);
    assert_eq!(report.level,3);
    assert_eq!(report.recovered,(0..10).collect::<Vec<u32>>());
    assert!(report.lost.is_empty());
    let mut img = reopen(img);
    assert_eq!(img.cdevhdr.options & dasd::OPT_ORDWR,dasd::OPT_ORDWR);
    assert_eq!(run(&mut img,3).status(),0);
    assert_tracks(&mut img,0..10);
}

#[test]
fn overlapping_entries() {
    let mut img = ckd_image(10);
    let (_,e0) = img.l2_entry(0).expect("read failed").expect("no table");
    let (pos1,_) = img.l2_entry(1).expect("read failed").expect("no table");
    let endian = img.endian();
    img.write_struct(pos1,&e0,endian,"spoil entry").expect("write failed");
    let report = run(&mut img,0);
    assert_eq!(report.status(),2);
    assert!(report.recovered.contains(&0));
    assert!(report.recovered.contains(&1));
    let mut img = reopen(img);
    assert_eq!(run(&mut img,3).status(),0);
    assert_tracks(&mut img,0..10);
}

#[test]
fn level_four_recovers_everything() {
    let mut img = ckd_image(10);
    let report = run(&mut img,4);
    assert_eq!(report.status(),2);
    assert_eq!(report.recovered.len(),10);
    assert_eq!(report.rebuilt_l2,vec![0]);
    let mut img = reopen(img);
    assert_eq!(run(&mut img,3).status(),0);
    assert_tracks(&mut img,0..10);
}

#[test]
fn read_only_leaves_bytes_alone() {
    let mut img = ckd_image(5);
    img.append_gap(50).expect("gap failed");
    add_tracks(&mut img,5..10);
    let before = img.into_inner().into_inner();
    let mut img = CckdImage::open(Cursor::new(before.clone())).expect("open failed");
    let report = chkdsk(&mut img,CheckOptions { level: 1, read_only: true }).expect("check failed");
    assert_eq!(report.status(),1);
    assert_eq!(img.into_inner().into_inner(),before);
}

#[test]
fn not_closed_is_cleared() {
    let mut img = ckd_image(10);
    img.cdevhdr.options |= dasd::OPT_OPENED;
    img.write_cdevhdr().expect("write failed");
    let report = run(&mut img,0);
    assert_eq!(report.status(),0);
    assert_eq!(report.level,1);
    let img = reopen(img);
    assert_eq!(img.cdevhdr.options & dasd::OPT_OPENED,0);
}

#[test]
fn json_report() {
    let mut img = ckd_image(3);
    let report = run(&mut img,2);
    let s = report.to_json(Some(2));
    assert!(s.contains("\"status\": 0"));
    assert!(s.contains("\"level\": 2"));
    let parsed = json::parse(&report.to_json(None)).expect("bad json");
    assert_eq!(parsed["free"]["total"],0);
}

#[test]
fn fba_groups_recovered() {
    let dev = names::by_name("3370").expect("no 3370");
    let mut img = CckdImage::create(Cursor::new(Vec::new()),dev,1200,false,false,0).expect("create failed");
    assert_eq!(img.geo.tracks,10);
    let mut images = Vec::new();
    for g in 0..4 {
        let image = track::build_fba(&img.geo,g,&vec![g as u8 + 0x40;4096]).expect("build failed");
        img.append_track(g,Kind::Zlib,&image).expect("append failed");
        images.push(image);
    }
    let data: Vec<u8> = (0..track::FBA_BLOCK_SIZE).map(|i| (i % 200 + 3) as u8).collect();
    let image = track::build_fba(&img.geo,4,&data).expect("build failed");
    img.append_track(4,Kind::None,&image).expect("append failed");
    images.push(image);
    let l1 = img.read_l1().expect("no level 1");
    img.write_bytes(l1[0] as u64,&vec![0xff;dasd::L2_TABLE_SIZE as usize],"spoil table").expect("write failed");
    let report = run(&mut img,0);
    assert_eq!(report.status(),2);
    assert_eq!(report.recovered,vec![0,1,2,3,4]);
    let mut img = reopen(img);
    assert_eq!(run(&mut img,3).status(),0);
    for g in 0..5 {
        assert_eq!(img.read_track(g).expect("read failed"),images[g as usize]);
    }
}

#[test]
fn lost_table_with_stale_header() {
    let mut img = ckd_image(10);
    zero_first_table(&mut img);
    img.append_gap(50).expect("gap failed");
    let report = run(&mut img,0);
    assert_eq!(report.status(),2);
    assert_eq!(report.level,3);
    assert_eq!(report.recovered,(0..10).collect::<Vec<u32>>());
    assert!(report.lost.is_empty());
    let mut img = reopen(img);
    assert_eq!(run(&mut img,3).status(),0);
    assert_tracks(&mut img,0..10);
}

#[test]
fn device_geometry_restored() {
    let mut img = ckd_image(10);
    img.devhdr.heads = 0;
    img.write_devhdr().expect("write failed");
    let mut img = reopen(img);
    assert_eq!(img.geo.tracks,0);
    let report = run(&mut img,3);
    assert_eq!(report.status(),1);
    assert!(report.lost.is_empty());
    assert!(report.recovered.is_empty());
    let mut img = reopen(img);
    assert_eq!(img.devhdr.heads,15);
    assert_eq!(img.geo.tracks,15);
    assert_eq!(run(&mut img,3).status(),0);
    assert_tracks(&mut img,0..10);
}

#[test]
fn space_errors_raise_level() {
    let mut img = ckd_image(10);
    img.cdevhdr.options |= dasd::OPT_SPERRS;
    img.write_cdevhdr().expect("write failed");
    let report = run(&mut img,0);
    assert_eq!(report.status(),1);
    assert_eq!(report.level,1);
    let mut img = reopen(img);
    assert_eq!(img.cdevhdr.options & dasd::OPT_SPERRS,0);
    assert_eq!(run(&mut img,1).status(),0);
    assert_tracks(&mut img,0..10);
}

#[test]
fn uncompressed_tracks_recovered() {
    let mut img = ckd_image_with(Kind::None,10);
    zero_first_table(&mut img);
    let report = run(&mut img,0);
    assert_eq!(report.status(),2);
    assert_eq!(report.recovered,(0..10).collect::<Vec<u32>>());
    let mut img = reopen(img);
    assert_eq!(run(&mut img,3).status(),0);
    assert_tracks(&mut img,0..10);
}

#[cfg(feature = "bzip2")]
#[test]
fn bzip2_tracks_recovered() {
    let mut img = ckd_image_with(Kind::Bzip2,10);
    zero_first_table(&mut img);
    let report = run(&mut img,0);
    assert_eq!(report.status(),2);
    assert_eq!(report.recovered,(0..10).collect::<Vec<u32>>());
    let mut img = reopen(img);
    assert_eq!(run(&mut img,3).status(),0);
    assert_tracks(&mut img,0..10);
}

#[cfg(not(feature = "bzip2"))]
#[test]
fn unsupported_codec_withholds_repairs() {
    let mut img = ckd_image_with(Kind::None,3);
    // relabel track 1 as bzip2, which is not compiled in
    let (_,e) = img.l2_entry(1).expect("read failed").expect("no table");
    img.write_bytes(e.pos as u64,&[2],"relabel").expect("write failed");
    img.append_gap(50).expect("gap failed");
    let before = img.into_inner().into_inner();
    let mut img = CckdImage::open(Cursor::new(before.clone())).expect("open failed");
    let report = run(&mut img,3);
    assert_eq!(report.status(),1);
    assert!(report.read_only_equivalent);
    assert_eq!(report.unsupported,vec![1]);
    assert_eq!(img.into_inner().into_inner(),before);
}

#[test]
fn no_room_for_rebuilt_table() {
    let mut img = ckd_image_with(Kind::None,0);
    let data = vec![0x33;3000];
    let image = track::build_ckd(&img.geo,0,&[(b"".as_slice(),data.as_slice())]).expect("build failed");
    img.append_track(0,Kind::None,&image).expect("append failed");
    let (_,e) = img.l2_entry(0).expect("read failed").expect("no table");
    assert!(e.len as u64 >= dasd::L2_TABLE_SIZE);
    // the only track takes the place of its table, which is now out of reach
    let stored = img.read_bytes(e.pos as u64,e.len as usize,"read track").expect("read failed");
    let l1_end = img.l1_end();
    img.write_bytes(l1_end,&stored,"move track").expect("write failed");
    img.truncate(l1_end + stored.len() as u64).expect("truncate failed");
    img.write_l1(&[l1_end as u32 + 0x100000]).expect("write failed");
    let result = chkdsk(&mut img,CheckOptions { level: 0, read_only: false });
    assert_eq!(status_of(&result),-1);
    assert!(matches!(result,Err(Error::NoSpaceForL2)));
}

#[test]
fn table_overlap_found_at_lowest_level() {
    // 20 cylinders need two level 2 tables
    let dev = names::by_name("3390").expect("no 3390");
    let mut img = CckdImage::create(Cursor::new(Vec::new()),dev,20,false,false,0).expect("create failed");
    add_tracks(&mut img,0..1);
    add_tracks(&mut img,260..261);
    let mut l1 = img.read_l1().expect("no level 1");
    l1[1] = l1[0];
    img.write_l1(&l1).expect("write failed");
    let report = run(&mut img,-1);
    assert_eq!(report.status(),2);
    assert_eq!(report.level,3);
    assert_eq!(report.recovered,vec![0,260]);
    let mut img = reopen(img);
    assert_eq!(run(&mut img,3).status(),0);
    assert_tracks(&mut img,0..1);
    assert_tracks(&mut img,260..261);
}

#[test]
fn small_gap_behind_table() {
    let mut img = ckd_image(1);
    let (epos,e) = img.l2_entry(0).expect("read failed").expect("no table");
    let l1 = img.read_l1().expect("no level 1");
    assert_eq!(e.pos as u64,l1[0] as u64 + dasd::L2_TABLE_SIZE);
    // leave 4 bytes between the table and the track
    let stored = img.read_bytes(e.pos as u64,e.len as usize,"read track").expect("read failed");
    img.write_bytes(e.pos as u64 + 4,&stored,"move track").expect("write failed");
    let moved = L2Entry { pos: e.pos + 4, ..e };
    let endian = img.endian();
    img.write_struct(epos,&moved,endian,"move entry").expect("write failed");
    assert_eq!(run(&mut img,1).status(),1);
    let mut img = reopen(img);
    let (_,after) = img.l2_entry(0).expect("read failed").expect("no table");
    assert_eq!(after.pos,e.pos);
    assert_eq!(after.size,e.len + 4);
    assert_eq!(img.cdevhdr.free_imbed,4);
    assert_eq!(run(&mut img,3).status(),0);
    assert_tracks(&mut img,0..1);
}

#[test]
fn version_stamped() {
    let mut img = ckd_image(3);
    img.cdevhdr.vrm = [0,3,0];
    img.write_cdevhdr().expect("write failed");
    assert_eq!(run(&mut img,0).status(),0);
    let img = reopen(img);
    assert_eq!(img.cdevhdr.vrm,dasd::VERSION);
}
