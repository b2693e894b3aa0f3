//! # Byte Order Normalizer
//!
//! Rewrites the compressed header, the level 1 table, every level 2 table, and the free space
//! structures in the opposite byte order.  The device header and track images are not touched.
//!
//! The header is written first with the old read-write bit set, so an interrupted swap is
//! visible on the next open.  The bit is put back the way it was when the swap completes,
//! which means swapping twice gives back the same bytes.

use binrw::Endian;
use log::{info,debug,warn};
use crate::dasd::{self,Error,FreeBlock,L2Table};
use crate::image::{CckdImage,Storage};

/// Swap the image to the opposite byte order
pub fn swap<S: Storage>(img: &mut CckdImage<S>) -> Result<(),Error> {
    let from = img.endian();
    let to = dasd::opposite(from);
    info!("swapping byte order from {:?} to {:?}",from,to);
    let orig_options = img.cdevhdr.options;
    let mut hdr = img.cdevhdr.clone();
    hdr.options = (orig_options ^ dasd::OPT_BIGENDIAN) | dasd::OPT_ORDWR;
    img.write_struct(dasd::CDEVHDR_POS,&hdr,to,"write compressed header")?;

    let l1 = img.read_l1_as(from)?;
    img.write_l1_as(&l1,to)?;
    let mut swapped = 0;
    for (l1x,entry) in l1.iter().enumerate() {
        let pos = *entry as u64;
        if dasd::l1_is_null(*entry) {
            continue;
        }
        if pos < img.l1_end() || pos + dasd::L2_TABLE_SIZE > img.file_len() {
            warn!("level 2 table {} at {:#x} is out of bounds, not swapped",l1x,pos);
            continue;
        }
        let l2: L2Table = img.read_struct(pos,from,"read level 2 table")?;
        img.write_struct(pos,&l2,to,"write level 2 table")?;
        swapped += 1;
    }
    debug!("swapped {} level 2 tables",swapped);
    swap_free(img,from,to)?;

    hdr.options = orig_options ^ dasd::OPT_BIGENDIAN;
    img.write_struct(dasd::CDEVHDR_POS,&hdr,to,"write compressed header")?;
    img.cdevhdr = hdr;
    Ok(())
}

/// Bring the image to host byte order if it is not already, returns true if a swap happened
pub fn normalize<S: Storage>(img: &mut CckdImage<S>) -> Result<bool,Error> {
    if img.endian()==dasd::host_endian() {
        return Ok(false);
    }
    swap(img)?;
    Ok(true)
}

fn swap_free<S: Storage>(img: &mut CckdImage<S>,from: Endian,to: Endian) -> Result<(),Error> {
    let start = img.cdevhdr.free as u64;
    if start==0 {
        return Ok(());
    }
    if start + dasd::FREEBLK_SIZE > img.file_len() {
        warn!("free space list at {:#x} is out of bounds, not swapped",start);
        return Ok(());
    }
    let magic = img.read_bytes(start,8,"read free space")?;
    if magic==dasd::FREE_MAGIC {
        for i in 0..img.cdevhdr.free_number as u64 {
            let pos = start + dasd::FREEBLK_SIZE * (i+1);
            if pos + dasd::FREEBLK_SIZE > img.file_len() {
                warn!("free space array runs past end of file");
                break;
            }
            let blk: FreeBlock = img.read_struct(pos,from,"read free space")?;
            img.write_struct(pos,&blk,to,"write free space")?;
        }
        return Ok(());
    }
    // the chain is followed in the order it was written
    let mut pos = start;
    let mut count = 0;
    while pos!=0 && count <= img.cdevhdr.free_number {
        if pos + dasd::FREEBLK_SIZE > img.file_len() {
            warn!("free space chain broken at {:#x}",pos);
            break;
        }
        let blk: FreeBlock = img.read_struct(pos,from,"read free space")?;
        img.write_struct(pos,&blk,to,"write free space")?;
        pos = blk.pos as u64;
        count += 1;
    }
    Ok(())
}
