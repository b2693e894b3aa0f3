//! # `cckdkit` main library
//!
//! This library checks, repairs, and compacts compressed CKD and FBA disk images, as used by
//! mainframe emulators.  A compressed image keeps each track (or FBA block group) as a
//! separately compressed record, located through a two level lookup table.
//!
//! ## Architecture
//!
//! * `dasd` holds the on-disk structures, the device table, track image rules, and the codecs
//! * `image::CckdImage` wraps the storage and does all structured reads and writes
//! * `space::SpaceTable` is the map of what occupies each byte range of the file
//! * `chkdsk` verifies and repairs an image at a selectable level
//! * `compact` rewrites an image with no free space
//! * `endian` converts the image indices between byte orders
//!
//! Storage is abstracted by the `image::Storage` trait, so every operation runs equally on a
//! host file or an in-memory buffer.
//!
//! ## Compression
//!
//! Track images can be stored raw, zlib compressed, or bzip2 compressed.  The codecs are
//! features (`zlib` and `bzip2`, both on by default).  A track using a codec that is not
//! compiled in is still accounted for, but it cannot be verified or expanded.

pub mod dasd;
pub mod image;
pub mod space;
pub mod endian;
pub mod compact;
pub mod chkdsk;
pub mod commands;

use std::fs::{File,OpenOptions};
use log::debug;
use image::CckdImage;
use dasd::names::DeviceType;

type DYNERR = Box<dyn std::error::Error>;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

/// Open an image file.  If `writable` is false the file is opened read only,
/// and any attempt to write will fail with an I/O error.
pub fn open_image_file(img_path: &str,writable: bool) -> Result<CckdImage<File>,DYNERR> {
    let file = OpenOptions::new().read(true).write(writable).open(img_path)?;
    debug!("opened {} {}",img_path,match writable { true => "read-write", false => "read-only" });
    Ok(CckdImage::open(file)?)
}

/// Create an empty image file, an existing file is overwritten.
pub fn create_image_file(img_path: &str,devtype: &'static DeviceType,cyls: u32,shadow: bool,big_endian: bool,nullfmt: u8) -> Result<CckdImage<File>,DYNERR> {
    let file = OpenOptions::new().read(true).write(true).create(true).truncate(true).open(img_path)?;
    Ok(CckdImage::create(file,devtype,cyls,shadow,big_endian,nullfmt)?)
}

/// Printable ASCII for an EBCDIC byte, `.` if none
fn ebcdic_char(c: u8) -> u8 {
    match c {
        0x40 => b' ',
        0x4b => b'.',
        0x4c => b'<',
        0x4d => b'(',
        0x4e => b'+',
        0x50 => b'&',
        0x5b => b'$',
        0x5c => b'*',
        0x5d => b')',
        0x5e => b';',
        0x60 => b'-',
        0x61 => b'/',
        0x6b => b',',
        0x6c => b'%',
        0x6d => b'_',
        0x6e => b'>',
        0x6f => b'?',
        0x7a => b':',
        0x7b => b'#',
        0x7c => b'@',
        0x7d => b'\'',
        0x7e => b'=',
        0x7f => b'"',
        0x81..=0x89 => b'a' + (c - 0x81),
        0x91..=0x99 => b'j' + (c - 0x91),
        0xa2..=0xa9 => b's' + (c - 0xa2),
        0xc1..=0xc9 => b'A' + (c - 0xc1),
        0xd1..=0xd9 => b'J' + (c - 0xd1),
        0xe2..=0xe9 => b'S' + (c - 0xe2),
        0xf0..=0xf9 => b'0' + (c - 0xf0),
        _ => b'.'
    }
}

/// Display binary to stdout in columns of hex, ascii, and ebcdic
pub fn display_block(start_addr: u64,block: &[u8]) {
    let mut slice_start = 0;
    loop {
        let row_label = start_addr + slice_start as u64;
        let mut slice_end = slice_start + 16;
        if slice_end > block.len() {
            slice_end = block.len();
        }
        let slice = &block[slice_start..slice_end];
        let txt: Vec<u8> = slice.iter().map(|c| match *c {
            x if x<32 => b'.',
            x if x<127 => x,
            _ => b'.'
        }).collect();
        let ebc: Vec<u8> = slice.iter().map(|c| ebcdic_char(*c)).collect();
        print!("{:08X} : ",row_label);
        for byte in slice {
            print!("{:02X} ",byte);
        }
        for _blank in slice_end..slice_start+16 {
            print!("   ");
        }
        print!("|a| {} ",String::from_utf8_lossy(&txt));
        for _blank in slice_end..slice_start+16 {
            print!(" ");
        }
        println!("|e| {}",String::from_utf8_lossy(&ebc));
        slice_start += 16;
        if slice_end>=block.len() {
            break;
        }
    }
}

#[test]
fn ebcdic_letters() {
    let hello: Vec<u8> = [0xc8,0x85,0x93,0x93,0x96,0x40,0xf1].iter().map(|c| ebcdic_char(*c)).collect();
    assert_eq!(hello,b"Hello 1");
}
