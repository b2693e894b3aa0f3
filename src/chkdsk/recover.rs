//! Track recovery
//!
//! Lost tracks are searched for in the regions no entry covers.  Every byte offset of a gap
//! is a candidate start, and a candidate is only accepted when its header names a wanted
//! track and its contents decode to a structurally valid image.  Accepted images are placed
//! in the space table as recovered, and the scan resumes after them.
//!
//! Gaps are read a window at a time, plus enough to hold the largest image starting
//! at the end of the window, so memory stays bounded however large the gap is.
//!
//! FBA is done in two passes: first block groups that prove their own extent (compressed,
//! or followed by another plausible header), then uncompressed groups anywhere they fit.

use std::collections::BTreeSet;
use log::{info,trace};
use super::{Checker,Severity,Code,MAX_LEVEL};
use crate::dasd::{self,Error,Media};
use crate::dasd::track::{self,TrackHeader,TRKHDR_SIZE,FBA_BLOCK_SIZE};
use crate::dasd::codec::{self,Kind};
use crate::image::Storage;
use crate::space::{Space,SpaceKind};

/// bytes of candidate offsets examined per read
const SCAN_WINDOW: usize = 1024 * 1024;

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
enum Pass {
    Ckd,
    FbaSelfBounded,
    FbaPlain
}

#[derive(Debug,Clone,Copy)]
struct Found {
    trk: u32,
    len: usize,
    /// false if the codec is not available, so the contents could not be checked
    verified: bool
}

impl<'a,S: Storage> Checker<'a,S> {
    /// Phase 6, look for wanted tracks in free space
    pub(super) fn recover(&mut self) -> Result<(),Error> {
        let before = self.recovered.len();
        match self.img.geo.media {
            Media::Ckd => self.scan_free(Pass::Ckd)?,
            Media::Fba => {
                self.scan_free(Pass::FbaSelfBounded)?;
                self.scan_free(Pass::FbaPlain)?;
            }
        }
        let missing: Vec<u32> = self.bad_trks.iter().filter(|t| !self.space.has_track(**t)).cloned().collect();
        for trk in missing {
            self.diag(Severity::Error,Code::Lost,format!("track {} could not be recovered",trk));
            self.lost.push(trk);
        }
        info!("{} tracks recovered, {} lost",self.recovered.len() - before,self.lost.len());
        Ok(())
    }
    fn wanted(&self,trk: u32,present: &BTreeSet<u32>) -> bool {
        let l1x = trk / dasd::L2_ENTRIES as u32;
        trk < self.img.geo.tracks
            && (l1x as usize) < self.l1.len()
            && !present.contains(&trk)
            && (self.level >= MAX_LEVEL || self.lost_data || self.bad_trks.contains(&trk) || self.bad_l2.contains(&l1x))
    }
    fn scan_free(&mut self,pass: Pass) -> Result<(),Error> {
        let mut present: BTreeSet<u32> = self.space.tracks().filter_map(|s| s.track()).collect();
        let max = self.img.geo.max_image_len();
        self.space.sort();
        let gaps = self.space.gaps();
        for gap in gaps {
            let gap_end = gap.pos + gap.len;
            let mut base = gap.pos;
            while base + (TRKHDR_SIZE as u64) <= gap_end {
                let want = u64::min(gap_end - base,(SCAN_WINDOW + max) as u64) as usize;
                let buf = self.img.read_bytes(base,want,"read free space")?;
                let at_end = base + want as u64==gap_end;
                let limit = match at_end {
                    true => buf.len(),
                    false => SCAN_WINDOW
                };
                let mut i = 0;
                while i < limit && i + TRKHDR_SIZE <= buf.len() {
                    match self.probe(pass,&buf[i..],at_end,&present) {
                        Some(found) => {
                            self.accept(found,base + i as u64);
                            present.insert(found.trk);
                            i += found.len;
                        },
                        None => i += 1
                    }
                }
                base += i as u64;
            }
        }
        Ok(())
    }
    fn accept(&mut self,found: Found,pos: u64) {
        let len = found.len as u64;
        self.space.push(Space::new(SpaceKind::Trk { trk: found.trk, recovered: true },pos,len,len));
        self.touched.insert(found.trk / dasd::L2_ENTRIES as u32);
        if found.verified {
            self.diag(Severity::Info,Code::Recovered,format!("track {} recovered at {:#x}, {} bytes",found.trk,pos,len));
            self.recovered.push(found.trk);
        } else {
            self.diag(Severity::Warning,Code::Unsupported,format!("track {} found at {:#x} but its compression is not available",found.trk,pos));
            self.unsupported.insert(found.trk);
        }
    }
    /// Is there a candidate image at the start of `slice`.
    /// If `at_end` the slice ends where the gap ends.
    fn probe(&self,pass: Pass,slice: &[u8],at_end: bool,present: &BTreeSet<u32>) -> Option<Found> {
        let geo = &self.img.geo;
        let hdr = TrackHeader::parse(geo.media,slice)?;
        let kind = Kind::from_tag(hdr.tag)?;
        let trk = geo.track_of(hdr.addr)?;
        if !self.wanted(trk,present) {
            return None;
        }
        trace!("candidate for track {} with {} compression",trk,kind);
        let group_len = TRKHDR_SIZE + FBA_BLOCK_SIZE;
        match (pass,kind) {
            (Pass::Ckd,Kind::None) => {
                let len = track::ckd_image_len(slice,geo.max_image_len()).ok()?;
                track::validate(geo,trk,&slice[0..len]).ok()?;
                Some(Found { trk, len, verified: true })
            },
            (Pass::FbaSelfBounded,Kind::None) => {
                if slice.len() < group_len {
                    return None;
                }
                let bounded = (at_end && slice.len()==group_len) || self.plausible_header(&slice[group_len..]);
                bounded.then_some(Found { trk, len: group_len, verified: true })
            },
            (Pass::FbaPlain,Kind::None) => {
                (slice.len() >= group_len).then_some(Found { trk, len: group_len, verified: true })
            },
            // compressed groups are all taken in the first pass
            (Pass::FbaPlain,_) => None,
            (_,k) => self.probe_compressed(k,trk,slice,at_end)
        }
    }
    fn probe_compressed(&self,kind: Kind,trk: u32,slice: &[u8],at_end: bool) -> Option<Found> {
        let max_out = self.img.geo.max_image_len().saturating_sub(TRKHDR_SIZE);
        if kind.supported() {
            if let Ok((used,payload)) = codec::decode_prefix(kind,&slice[TRKHDR_SIZE..],max_out) {
                if self.verify(trk,&slice[0..TRKHDR_SIZE],&payload) {
                    return Some(Found { trk, len: TRKHDR_SIZE + used, verified: true });
                }
            }
        }
        // otherwise the next plausible header marks the end
        let end = self.next_header(slice,at_end)?;
        if !kind.supported() {
            return Some(Found { trk, len: end, verified: false });
        }
        let payload = codec::decode(kind,&slice[TRKHDR_SIZE..end],max_out).ok()?;
        self.verify(trk,&slice[0..TRKHDR_SIZE],&payload).then_some(Found { trk, len: end, verified: true })
    }
    fn verify(&self,trk: u32,hdr: &[u8],payload: &[u8]) -> bool {
        let mut image = hdr.to_vec();
        image[0] = 0;
        image.extend_from_slice(payload);
        track::validate(&self.img.geo,trk,&image).is_ok()
    }
    /// Offset of the next plausible image header after the one at the start of `slice`
    fn next_header(&self,slice: &[u8],at_end: bool) -> Option<usize> {
        let max = usize::min(slice.len(),self.img.geo.max_image_len());
        for j in TRKHDR_SIZE + 1..max {
            if self.plausible_header(&slice[j..]) {
                return Some(j);
            }
        }
        (at_end && slice.len() <= self.img.geo.max_image_len()).then_some(slice.len())
    }
    fn plausible_header(&self,slice: &[u8]) -> bool {
        let geo = &self.img.geo;
        let hdr = match TrackHeader::parse(geo.media,slice) {
            Some(h) => h,
            None => return false
        };
        if Kind::from_tag(hdr.tag).is_none() || geo.track_of(hdr.addr).is_none() {
            return false;
        }
        if geo.media==Media::Ckd && hdr.tag==0 {
            // record zero must follow an uncompressed home address
            return slice.len() >= 13 && slice[5..9]==slice[1..5] && slice[9]==0 && slice[10]==0 && slice[11..13]==[0,8];
        }
        true
    }
}
