//! # Compactor
//!
//! Rewrites an image so that there is no free space: the level 2 tables follow the level 1
//! table in index order, the track images follow the level 2 tables, and the file ends
//! right after the last image.  Level 2 tables with only null entries are dropped.
//!
//! The image must be structurally sound, e.g. after a successful check.  If it is already
//! compact nothing is written at all.

use log::{info,debug,trace};
use crate::dasd::{self,Error,L2Entry,L2Table};
use crate::image::{CckdImage,Storage};
use crate::space::{Space,SpaceKind,SpaceTable};
use crate::endian;

/// bytes moved per read/write cycle
const MOVE_CHUNK: usize = 256 * 1024;

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum CompactOutcome {
    NothingToDo,
    Compacted {
        old_size: u64,
        new_size: u64,
        /// images that had to be moved
        moved: usize,
        /// level 2 tables released because all entries were null
        dropped: usize
    }
}

/// Remove all free space from the image
pub fn compact<S: Storage>(img: &mut CckdImage<S>) -> Result<CompactOutcome,Error> {
    if endian::normalize(img)? {
        info!("image converted to host byte order");
    }
    let shadow = img.geo.shadow;
    let nullfmt = img.cdevhdr.nullfmt;
    let numl1tab = img.cdevhdr.numl1tab;
    let old_size = img.file_len();
    let mut l1 = img.read_l1()?;
    let mut l2s = img.read_l2_tables(&l1)?;

    let mut dropped = 0;
    for l1x in 0..l2s.len() {
        if let Some(table) = &l2s[l1x] {
            if table.is_null(shadow,nullfmt) {
                debug!("level 2 table {} is null and will be released",l1x);
                l2s[l1x] = None;
                l1[l1x] = dasd::l1_sentinel(shadow);
                dropped += 1;
            }
        }
    }
    let mut space = SpaceTable::build(numl1tab,old_size,&l1,&l2s,img.geo.max_image_len())?;
    if let Some((a,b)) = space.overlaps().first() {
        let (a,b) = (space.entries()[*a],space.entries()[*b]);
        return Err(Error::Overlap { pos: a.pos, next: b.pos });
    }
    let l1_end = img.l1_end();
    let l2_end = l1_end + l2s.iter().flatten().count() as u64 * dasd::L2_TABLE_SIZE;
    if dropped==0 && is_compact(img,&space,&l1,l1_end) {
        info!("image is already compact");
        return Ok(CompactOutcome::NothingToDo);
    }

    img.cdevhdr.options |= dasd::OPT_OPENED;
    img.write_cdevhdr()?;

    // images sitting where the level 2 tables will go are held in memory
    let mut evicted: Vec<(u32,Vec<u8>)> = Vec::new();
    let in_l2_area: Vec<Space> = space.tracks().filter(|s| s.pos < l2_end).cloned().collect();
    for s in in_l2_area {
        let trk = s.track().unwrap_or(0);
        let buf = img.read_bytes(s.pos,s.len as usize,"read track image")?;
        trace!("track {} evicted from {:#x}",trk,s.pos);
        evicted.push((trk,buf));
    }
    space.retain(|s| !(s.track().is_some() && s.pos < l2_end));
    space.retain(|s| !matches!(s.kind,SpaceKind::L2 { .. }));

    let mut next = l1_end;
    for (l1x,table) in l2s.iter().enumerate() {
        if table.is_some() {
            l1[l1x] = next as u32;
            space.push(Space::new(SpaceKind::L2 { l1x: l1x as u32 },next,dasd::L2_TABLE_SIZE,dasd::L2_TABLE_SIZE));
            next += dasd::L2_TABLE_SIZE;
        }
    }
    space.sort();

    // slide the remaining images to the left, in offset order
    let mut moved = 0;
    let mut cursor = l2_end;
    for s in space.entries_mut().iter_mut() {
        if s.track().is_none() {
            continue;
        }
        if s.pos!=cursor {
            move_bytes(img,s.pos,cursor,s.len)?;
            moved += 1;
        }
        s.pos = cursor;
        s.siz = s.len;
        cursor += s.len;
    }
    for (trk,bytes) in evicted {
        img.write_bytes(cursor,&bytes,"write track image")?;
        let len = bytes.len() as u64;
        space.push(Space::new(SpaceKind::Trk { trk, recovered: false },cursor,len,len));
        cursor += len;
        moved += 1;
    }

    // rewrite the indices
    for s in space.tracks() {
        let trk = s.track().unwrap_or(0) as usize;
        let table: &mut L2Table = match l2s[trk / dasd::L2_ENTRIES].as_mut() {
            Some(t) => t,
            None => return Err(Error::Structure(format!("track {} has no level 2 table",trk)))
        };
        table.entries[trk % dasd::L2_ENTRIES] = L2Entry { pos: s.pos as u32, len: s.len as u16, size: s.len as u16 };
    }
    for (l1x,table) in l2s.iter().enumerate() {
        if let Some(t) = table {
            img.write_l2(l1[l1x] as u64,t)?;
        }
    }
    img.write_l1(&l1)?;
    let hdr = &mut img.cdevhdr;
    hdr.size = cursor as u32;
    hdr.used = cursor as u32;
    hdr.free = 0;
    hdr.free_total = 0;
    hdr.free_largest = 0;
    hdr.free_number = 0;
    hdr.free_imbed = 0;
    hdr.vrm = dasd::VERSION;
    hdr.options &= !dasd::OPT_OPENED;
    img.write_cdevhdr()?;
    img.truncate(cursor)?;
    img.flush()?;
    info!("compacted from {} to {} bytes, {} images moved, {} tables released",old_size,cursor,moved,dropped);
    Ok(CompactOutcome::Compacted { old_size, new_size: cursor, moved, dropped })
}

/// Copy `len` bytes from `src` to `dst`, where `dst < src`, a chunk at a time
fn move_bytes<S: Storage>(img: &mut CckdImage<S>,src: u64,dst: u64,len: u64) -> Result<(),Error> {
    let mut done = 0;
    while done < len {
        let n = u64::min(len - done,MOVE_CHUNK as u64) as usize;
        let chunk = img.read_bytes(src + done,n,"read track image")?;
        img.write_bytes(dst + done,&chunk,"write track image")?;
        done += n as u64;
    }
    Ok(())
}

fn is_compact<S: Storage>(img: &CckdImage<S>,space: &SpaceTable,l1: &[u32],l1_end: u64) -> bool {
    let hdr = &img.cdevhdr;
    if !space.gaps().is_empty() || space.imbed() > 0 {
        return false;
    }
    let mut expected = l1_end;
    for entry in l1.iter().filter(|e| !dasd::l1_is_null(**e)) {
        if *entry as u64!=expected {
            return false;
        }
        expected += dasd::L2_TABLE_SIZE;
    }
    hdr.free==0 && hdr.free_total==0 && hdr.free_number==0 && hdr.free_largest==0 && hdr.free_imbed==0
        && hdr.options & dasd::OPT_OPENED==0
        && hdr.size as u64==img.file_len() && hdr.used==hdr.size
}
