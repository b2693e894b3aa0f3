//! Index and free space rebuild
//!
//! Level 2 tables for touched slots are regenerated from the space table and placed
//! first-fit in free space.  The free space list is then rewritten from the gaps,
//! as an array when one gap can hold it, otherwise as a chain with one node per gap.

use std::collections::BTreeSet;
use log::debug;
use super::{Checker,Severity,Code};
use crate::dasd::{self,Error,L2Entry,L2Table,FreeBlock};
use crate::image::Storage;
use crate::space::{Space,SpaceKind,Gap};

/// Image moved back over a small gap in front of it
#[derive(Debug,Clone,Copy)]
struct Slide {
    src: u64,
    dst: u64,
    len: u64
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
enum Layout {
    None,
    Array(u64),
    Chain
}

impl<'a,S: Storage> Checker<'a,S> {
    /// Phase 7, regenerate the level 2 tables of touched slots
    pub(super) fn rebuild_index(&mut self) -> Result<(),Error> {
        let shadow = self.img.geo.shadow;
        let nullfmt = self.img.cdevhdr.nullfmt;
        let mut slots: BTreeSet<u32> = self.touched.clone();
        slots.extend(self.recovered.iter().map(|t| t / dasd::L2_ENTRIES as u32));
        for l1x in slots {
            let idx = l1x as usize;
            if idx >= self.l1.len() {
                continue;
            }
            self.space.retain(|s| s.kind!=SpaceKind::L2 { l1x });
            let mut table = L2Table::null(shadow,nullfmt);
            for s in self.space.tracks() {
                if let Some(trk) = s.track() {
                    if trk / dasd::L2_ENTRIES as u32==l1x {
                        table.entries[trk as usize % dasd::L2_ENTRIES] = L2Entry { pos: s.pos as u32, len: s.len as u16, size: s.siz as u16 };
                    }
                }
            }
            if table.is_null(shadow,nullfmt) {
                if !dasd::l1_is_null(self.l1[idx]) {
                    self.diag(Severity::Info,Code::L2Released,format!("level 2 table {} has no tracks and is released",l1x));
                    self.released_l2.push(l1x);
                }
                self.l1[idx] = dasd::l1_sentinel(shadow);
                self.l2s[idx] = None;
                continue;
            }
            self.space.sort();
            let gap = self.space.first_fit(dasd::L2_TABLE_SIZE).ok_or(Error::NoSpaceForL2)?;
            self.space.push(Space::new(SpaceKind::L2 { l1x },gap.pos,dasd::L2_TABLE_SIZE,dasd::L2_TABLE_SIZE));
            self.diag(Severity::Info,Code::L2Rebuilt,format!("level 2 table {} rebuilt at {:#x} with {} tracks",l1x,gap.pos,table.live_count()));
            self.l1[idx] = gap.pos as u32;
            self.l2s[idx] = Some(table);
            self.rebuilt_l2.push(l1x);
        }
        self.space.sort();
        self.rebuild_free = true;
        if !self.writable() {
            return Ok(());
        }
        self.begin_write()?;
        for l1x in self.rebuilt_l2.clone() {
            let idx = l1x as usize;
            if let Some(table) = &self.l2s[idx] {
                self.img.write_l2(self.l1[idx] as u64,table)?;
            }
        }
        self.img.write_l1(&self.l1)?;
        Ok(())
    }

    /// Phase 8, rewrite the free space list and header counters
    pub(super) fn rebuild_free_space(&mut self) -> Result<(),Error> {
        self.space.sort();
        let mut gaps = self.space.gaps();
        let mut end = self.space.eof();
        if let Some(last) = gaps.last() {
            if last.pos + last.len==end {
                end = last.pos;
                gaps.pop();
            }
        }
        self.space.set_eof(end);
        let need = dasd::FREEBLK_SIZE * (gaps.len() as u64 + 1);
        let layout = match gaps.iter().find(|g| g.len >= need) {
            _ if gaps.is_empty() => Layout::None,
            Some(g) => Layout::Array(g.pos),
            None => Layout::Chain
        };
        let mut absorbed: BTreeSet<u32> = BTreeSet::new();
        let mut slides: Vec<Slide> = Vec::new();
        if layout==Layout::Chain {
            let small: Vec<Gap> = gaps.iter().filter(|g| g.len < dasd::FREEBLK_SIZE).cloned().collect();
            for g in small {
                let (l1x,slide) = self.absorb(g)?;
                absorbed.insert(l1x);
                slides.extend(slide);
            }
            gaps.retain(|g| g.len >= dasd::FREEBLK_SIZE);
        }
        let stats = self.space.free_stats();
        {
            let hdr = &mut self.img.cdevhdr;
            hdr.size = end as u32;
            hdr.used = (end - stats.total) as u32;
            hdr.free_total = stats.total as u32;
            hdr.free_largest = stats.largest as u32;
            hdr.free_number = stats.number as u32;
            hdr.free_imbed = stats.imbed as u32;
            hdr.free = match layout {
                Layout::None => 0,
                Layout::Array(pos) => pos as u32,
                Layout::Chain => gaps.first().map(|g| g.pos as u32).unwrap_or(0)
            };
        }
        self.free_rebuilt = true;
        self.diag(Severity::Info,Code::FreeRebuilt,format!("free space rebuilt, {} bytes in {} gaps, file size {}",
            stats.total,stats.number,end));
        if !self.writable() {
            return Ok(());
        }
        self.begin_write()?;
        let endian = self.img.endian();
        match layout {
            Layout::None => {},
            Layout::Array(pos) => {
                self.img.write_bytes(pos,&dasd::FREE_MAGIC,"write free space")?;
                for (i,g) in gaps.iter().enumerate() {
                    let blk = FreeBlock { pos: g.pos as u32, len: g.len as u32 };
                    self.img.write_struct(pos + dasd::FREEBLK_SIZE * (i as u64 + 1),&blk,endian,"write free space")?;
                }
            },
            Layout::Chain => {
                for (i,g) in gaps.iter().enumerate() {
                    let next = gaps.get(i+1).map(|n| n.pos as u32).unwrap_or(0);
                    let blk = FreeBlock { pos: next, len: g.len as u32 };
                    self.img.write_struct(g.pos,&blk,endian,"write free space")?;
                }
            }
        }
        for sl in slides {
            let buf = self.img.read_bytes(sl.src,sl.len as usize,"read track image")?;
            self.img.write_bytes(sl.dst,&buf,"move track image")?;
        }
        for l1x in absorbed {
            let idx = l1x as usize;
            if let Some(table) = &self.l2s[idx] {
                self.img.write_l2(self.l1[idx] as u64,table)?;
            }
        }
        if end < self.img.file_len() {
            self.img.truncate(end)?;
        }
        debug!("free space written as {:?}",layout);
        Ok(())
    }

    /// Give a gap too small for a chain node to the image in front of it, or failing that
    /// move the image behind it back over the gap.
    /// Returns the level 1 slot whose table changed and any move to carry out.
    fn absorb(&mut self,gap: Gap) -> Result<(u32,Option<Slide>),Error> {
        let entries = self.space.entries();
        let before = entries.iter().position(|s| s.end()==gap.pos && s.track().is_some());
        let after = entries.iter().position(|s| s.pos==gap.pos + gap.len && s.track().is_some());
        let (idx,slide) = match (before,after) {
            (Some(i),_) => (i,None),
            (None,Some(i)) => (i,Some(Slide { src: entries[i].pos, dst: gap.pos, len: entries[i].len })),
            (None,None) => return Err(Error::FreeListUnwritable)
        };
        let entry = &mut self.space.entries_mut()[idx];
        if entry.siz + gap.len > u16::MAX as u64 {
            return Err(Error::FreeListUnwritable);
        }
        entry.siz += gap.len;
        if let Some(sl) = slide {
            entry.pos = sl.dst;
        }
        let (trk,l2e) = match entry.kind {
            SpaceKind::Trk { trk, .. } => (trk,L2Entry { pos: entry.pos as u32, len: entry.len as u16, size: entry.siz as u16 }),
            _ => return Err(Error::FreeListUnwritable)
        };
        let l1x = trk / dasd::L2_ENTRIES as u32;
        let table = self.l2s.get_mut(l1x as usize).and_then(|t| t.as_mut()).ok_or(Error::FreeListUnwritable)?;
        table.entries[trk as usize % dasd::L2_ENTRIES] = l2e;
        debug!("{} bytes at {:#x} absorbed by track {}",gap.len,gap.pos,trk);
        Ok((l1x,slide))
    }
}
