// test of byte order conversion
use std::io::Cursor;
use binrw::Endian;
use cckdkit::image::CckdImage;
use cckdkit::dasd::{self,names,track};
use cckdkit::dasd::codec::Kind;
use cckdkit::chkdsk::{chkdsk,CheckOptions};
use cckdkit::compact::compact;
use cckdkit::endian;

type Img = CckdImage<Cursor<Vec<u8>>>;

fn ckd_track(img: &Img,trk: u32) -> Vec<u8> {
    let data = vec![trk as u8;1500];
    track::build_ckd(&img.geo,trk,&[(b"".as_slice(),data.as_slice())]).expect("build failed")
}

/// 3380 with one cylinder and a gap in the middle
fn image_with_gap(big: bool,gap: u64) -> Img {
    let dev = names::by_name("3380").expect("no 3380");
    let mut img = CckdImage::create(Cursor::new(Vec::new()),dev,1,false,big,0).expect("create failed");
    for trk in 0..6 {
        if trk==3 {
            img.append_gap(gap).expect("gap failed");
        }
        let image = ckd_track(&img,trk);
        img.append_track(trk,Kind::Zlib,&image).expect("append failed");
    }
    img
}

fn endian_of(img: &Img) -> Endian {
    img.cdevhdr.endian()
}

#[test]
fn double_swap_is_identity() {
    for gap in [40,12] {
        let mut img = image_with_gap(false,gap);
        // write a free space list, array or chain depending on the gap
        let opts = CheckOptions { level: 1, read_only: false };
        assert_eq!(chkdsk(&mut img,opts).expect("check failed").status(),1);
        let before = img.into_inner().into_inner();
        let mut img = CckdImage::open(Cursor::new(before.clone())).expect("open failed");
        endian::swap(&mut img).expect("swap failed");
        let mut img = CckdImage::open(img.into_inner()).expect("reopen failed");
        assert_eq!(endian_of(&img),Endian::Big);
        assert_eq!(img.read_track(4).expect("read failed"),ckd_track(&img,4));
        endian::swap(&mut img).expect("swap failed");
        assert_eq!(img.into_inner().into_inner(),before);
    }
}

#[test]
fn swapped_image_checks_clean() {
    let mut img = image_with_gap(false,40);
    assert_eq!(chkdsk(&mut img,CheckOptions { level: 1, read_only: false }).expect("check failed").status(),1);
    endian::swap(&mut img).expect("swap failed");
    let mut img = CckdImage::open(img.into_inner()).expect("reopen failed");
    assert_eq!(chkdsk(&mut img,CheckOptions { level: 3, read_only: false }).expect("check failed").status(),0);
    assert_eq!(endian_of(&img),dasd::host_endian());
    let mut img = CckdImage::open(img.into_inner()).expect("reopen failed");
    assert_eq!(endian_of(&img),dasd::host_endian());
    assert!(img.read_free_list().is_ok());
}

#[test]
fn read_only_check_keeps_order() {
    let mut img = image_with_gap(true,40);
    let before = img.cdevhdr.options;
    let report = chkdsk(&mut img,CheckOptions { level: 1, read_only: true }).expect("check failed");
    assert_eq!(report.status(),1);
    let img = CckdImage::open(img.into_inner()).expect("reopen failed");
    assert_eq!(img.cdevhdr.options,before);
}

#[test]
fn normalize_and_compact() {
    let mut img = image_with_gap(true,40);
    assert_eq!(endian::normalize(&mut img).expect("normalize failed"),dasd::host_endian()==Endian::Little);
    assert!(!endian::normalize(&mut img).expect("normalize failed"));
    let mut img = image_with_gap(true,40);
    compact(&mut img).expect("compact failed");
    let mut img = CckdImage::open(img.into_inner()).expect("reopen failed");
    assert_eq!(endian_of(&img),dasd::host_endian());
    for trk in 0..6 {
        assert_eq!(img.read_track(trk).expect("read failed"),ckd_track(&img,trk));
    }
}
