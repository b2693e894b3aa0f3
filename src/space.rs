//! # Space Table
//!
//! Describes every region of the file: fixed headers, level 1 table, level 2 tables,
//! stored track images, free space, and end of file.  The table is the basis of both
//! the compactor and the checker.
//!
//! Entries are removed by filtering and the table is sorted again, so there is never
//! a placeholder entry to skip.  Overlaps are reported, never resolved here.

use std::cmp::Ordering;
use crate::dasd::{self,L2Table,Error};

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum SpaceKind {
    DevHdr,
    CdevHdr,
    L1,
    L2 { l1x: u32 },
    Trk { trk: u32, recovered: bool },
    Free,
    Eof
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub struct Space {
    pub kind: SpaceKind,
    pub pos: u64,
    /// bytes in use
    pub len: u64,
    /// bytes allocated, `siz - len` is imbedded free space
    pub siz: u64
}

impl Space {
    pub fn new(kind: SpaceKind,pos: u64,len: u64,siz: u64) -> Self {
        Self { kind, pos, len, siz }
    }
    pub fn end(&self) -> u64 {
        self.pos + self.siz
    }
    pub fn track(&self) -> Option<u32> {
        match self.kind {
            SpaceKind::Trk { trk, .. } => Some(trk),
            _ => None
        }
    }
    fn sort_key(&self) -> (bool,u64) {
        (self.kind==SpaceKind::Eof,self.pos)
    }
}

/// A region not covered by any entry
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub struct Gap {
    pub pos: u64,
    pub len: u64
}

/// Free space counters as kept in the compressed header
#[derive(Debug,Clone,Copy,PartialEq,Eq,Default)]
pub struct FreeStats {
    pub total: u64,
    pub largest: u64,
    pub number: u64,
    pub imbed: u64
}

#[derive(Debug,Clone,Default)]
pub struct SpaceTable {
    entries: Vec<Space>
}

impl SpaceTable {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }
    /// Table holding the fixed regions and the end of file
    pub fn with_headers(numl1tab: u32,file_len: u64) -> Self {
        let l1_len = numl1tab as u64 * dasd::L1_ENTRY_SIZE;
        let mut ans = Self::new();
        ans.push(Space::new(SpaceKind::DevHdr,dasd::DEVHDR_POS,dasd::DEVHDR_SIZE,dasd::DEVHDR_SIZE));
        ans.push(Space::new(SpaceKind::CdevHdr,dasd::CDEVHDR_POS,dasd::CDEVHDR_SIZE,dasd::CDEVHDR_SIZE));
        if l1_len > 0 {
            ans.push(Space::new(SpaceKind::L1,dasd::L1_POS,l1_len,l1_len));
        }
        ans.push(Space::new(SpaceKind::Eof,file_len,0,0));
        ans
    }
    /// Table of a structurally sound image, built from tables already loaded.
    /// Track entries must be inside the file, anything else is an error.
    pub fn build(numl1tab: u32,file_len: u64,l1: &[u32],l2s: &[Option<L2Table>],max_len: usize) -> Result<Self,Error> {
        let mut ans = Self::with_headers(numl1tab,file_len);
        let l1_end = dasd::L1_POS + numl1tab as u64 * dasd::L1_ENTRY_SIZE;
        for (l1x,maybe) in l2s.iter().enumerate() {
            let table = match maybe {
                Some(t) => t,
                None => continue
            };
            ans.push(Space::new(SpaceKind::L2 { l1x: l1x as u32 },l1[l1x] as u64,dasd::L2_TABLE_SIZE,dasd::L2_TABLE_SIZE));
            for (l2x,e) in table.entries.iter().enumerate() {
                if !e.is_live() {
                    continue;
                }
                let trk = (l1x * dasd::L2_ENTRIES + l2x) as u32;
                let (pos,len,siz) = (e.pos as u64,e.len as u64,e.size as u64);
                if pos < l1_end || pos + siz > file_len || len > siz || len as usize > max_len {
                    return Err(Error::Structure(format!("track {} entry {}+{}/{} is out of bounds",trk,pos,len,siz)));
                }
                ans.push(Space::new(SpaceKind::Trk { trk, recovered: false },pos,len,siz));
            }
        }
        ans.sort();
        Ok(ans)
    }
    pub fn push(&mut self,s: Space) {
        self.entries.push(s);
    }
    pub fn entries(&self) -> &[Space] {
        &self.entries
    }
    pub fn entries_mut(&mut self) -> &mut [Space] {
        &mut self.entries
    }
    pub fn retain<F: FnMut(&Space) -> bool>(&mut self,f: F) {
        self.entries.retain(f);
    }
    /// Remove and return the entry for a track
    pub fn take_track(&mut self,trk: u32) -> Option<Space> {
        let idx = self.entries.iter().position(|s| s.track()==Some(trk))?;
        Some(self.entries.remove(idx))
    }
    pub fn has_track(&self,trk: u32) -> bool {
        self.entries.iter().any(|s| s.track()==Some(trk))
    }
    pub fn tracks(&self) -> impl Iterator<Item = &Space> {
        self.entries.iter().filter(|s| s.track().is_some())
    }
    pub fn eof(&self) -> u64 {
        self.entries.iter().find(|s| s.kind==SpaceKind::Eof).map(|s| s.pos).unwrap_or(0)
    }
    pub fn set_eof(&mut self,len: u64) {
        self.entries.retain(|s| s.kind!=SpaceKind::Eof);
        self.entries.push(Space::new(SpaceKind::Eof,len,0,0));
    }
    /// Sort by offset with end of file last
    pub fn sort(&mut self) {
        self.entries.sort_by(|a,b| match a.sort_key().cmp(&b.sort_key()) {
            Ordering::Equal => a.siz.cmp(&b.siz),
            ord => ord
        });
    }
    /// Pairs of overlapping neighbors, by index into the sorted entries.
    /// The end of file is included, so a region running past it is reported.
    pub fn overlaps(&self) -> Vec<(usize,usize)> {
        let mut ans = Vec::new();
        let mut reach: Option<usize> = None;
        for i in 0..self.entries.len() {
            if let Some(r) = reach {
                let prev = &self.entries[r];
                let curr = &self.entries[i];
                if prev.end() > curr.pos {
                    ans.push((r,i));
                }
            }
            match reach {
                Some(r) if self.entries[r].end() >= self.entries[i].end() => {},
                _ => reach = Some(i)
            }
        }
        ans
    }
    /// Regions covered by nothing, in offset order, including any space before end of file
    pub fn gaps(&self) -> Vec<Gap> {
        let mut ans = Vec::new();
        let mut edge = 0;
        for s in &self.entries {
            if s.pos > edge {
                ans.push(Gap { pos: edge, len: s.pos - edge });
            }
            edge = u64::max(edge,s.end());
        }
        ans
    }
    /// Gaps become free entries
    pub fn build_free(&mut self) {
        for g in self.gaps() {
            self.push(Space::new(SpaceKind::Free,g.pos,g.len,g.len));
        }
        self.sort();
    }
    /// Add free entries from a free space list
    pub fn add_free_list(&mut self,extents: &[(u64,u64)]) {
        for (pos,len) in extents {
            self.push(Space::new(SpaceKind::Free,*pos,*len,*len));
        }
        self.sort();
    }
    /// Bytes in use: headers, tables, and the used length of images
    pub fn used(&self) -> u64 {
        self.entries.iter().filter(|s| s.kind!=SpaceKind::Free).map(|s| s.len).sum()
    }
    pub fn imbed(&self) -> u64 {
        self.entries.iter().map(|s| s.siz - u64::min(s.siz,s.len)).sum()
    }
    /// Counters the header ought to have, gaps are the only free space outside of images
    pub fn free_stats(&self) -> FreeStats {
        let gaps = self.gaps();
        let imbed = self.imbed();
        FreeStats {
            total: gaps.iter().map(|g| g.len).sum::<u64>() + imbed,
            largest: gaps.iter().map(|g| g.len).max().unwrap_or(0),
            number: gaps.len() as u64,
            imbed
        }
    }
    /// First gap that can hold `len` bytes
    pub fn first_fit(&self,len: u64) -> Option<Gap> {
        self.gaps().into_iter().find(|g| g.len >= len)
    }
    /// True if sorted entries cover the file exactly once, up to end of file
    pub fn tiles(&self) -> bool {
        let mut edge = 0;
        for s in &self.entries {
            if s.pos!=edge {
                return false;
            }
            if s.kind==SpaceKind::Eof {
                return true;
            }
            edge = s.end();
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trk(trk: u32,pos: u64,len: u64,siz: u64) -> Space {
        Space::new(SpaceKind::Trk { trk, recovered: false },pos,len,siz)
    }

    #[test]
    fn gaps_and_stats() {
        let mut t = SpaceTable::with_headers(1,4000);
        t.push(Space::new(SpaceKind::L2 { l1x: 0 },1028,2048,2048));
        t.push(trk(0,3100,100,110));
        t.push(trk(1,3210,500,500));
        t.sort();
        assert!(t.overlaps().is_empty());
        let gaps = t.gaps();
        assert_eq!(gaps,vec![Gap { pos: 3076, len: 24 },Gap { pos: 3710, len: 290 }]);
        let stats = t.free_stats();
        assert_eq!(stats,FreeStats { total: 324, largest: 290, number: 2, imbed: 10 });
        assert_eq!(t.used(),1028 + 2048 + 600);
        assert_eq!(t.used() + stats.total,4000);
        assert!(!t.tiles());
        t.build_free();
        assert!(t.tiles());
    }

    #[test]
    fn overlap_found() {
        let mut t = SpaceTable::with_headers(1,6000);
        t.push(trk(0,2000,1000,1000));
        t.push(trk(1,2500,100,100));
        t.push(trk(2,3200,3000,3000));
        t.sort();
        let ov = t.overlaps();
        assert_eq!(ov.len(),2);
        let names: Vec<(Option<u32>,Option<u32>)> = ov.iter()
            .map(|(a,b)| (t.entries()[*a].track(),t.entries()[*b].track())).collect();
        assert_eq!(names[0],(Some(0),Some(1)));
        // track 2 runs past the end of file
        assert_eq!(names[1],(Some(2),None));
    }
}
