//! # Image Checker
//!
//! Verifies and repairs a compressed image.  The check level selects how deep to look:
//!
//! * -1: headers, level 1 table, and the regions of the level 2 tables
//! * 0: also every level 2 entry and the free space counters
//! * 1: also the free space list
//! * 2: also the header of every track image
//! * 3: also decode every track image and check its structure
//! * 4: discard the level 2 tables and recover every track by scanning the file
//!
//! The level only goes up during a run.  Problems found at one level may raise it, and when
//! the space table can no longer be trusted the passes are started over at the new level.
//! Entries found to be bad are remembered across restarts and left out of the rebuilt table.
//!
//! After the passes, lost tracks are searched for in free space (see `recover`), damaged level 2
//! tables are rebuilt and the free space list is rewritten (see `rebuild`).
//! The outcome is 0 (clean), 1 (free space rebuilt), or 2 (tracks recovered or indices rebuilt);
//! anything the run cannot get past is an `Err`.

mod recover;
mod rebuild;

use std::collections::BTreeSet;
use std::fmt;
use log::{info,warn,error,debug};
use crate::dasd::{self,Error,Geometry,L2Table,L1Fit,Media};
use crate::dasd::track::{self,TrackHeader,TRKHDR_SIZE};
use crate::dasd::codec::Kind;
use crate::image::{CckdImage,Storage,FreeList};
use crate::space::{SpaceKind,Space,SpaceTable,FreeStats};
use crate::endian;

pub const MIN_LEVEL: i32 = -1;
pub const MAX_LEVEL: i32 = 4;

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub struct CheckOptions {
    pub level: i32,
    /// report only, never write
    pub read_only: bool
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self { level: 0, read_only: false }
    }
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum Severity {
    Info,
    Warning,
    Error
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum Code {
    LevelRaised,
    NotClosed,
    SpaceErrors,
    Version,
    Header,
    ByteOrder,
    L1Count,
    L2Invalid,
    TrackInvalid,
    TrackBeyondDevice,
    Overlap,
    FreeCounters,
    FreeList,
    LostData,
    Unsupported,
    Recovered,
    Lost,
    L2Rebuilt,
    L2Released,
    FreeRebuilt,
    ReadOnlyEquivalent
}

impl Code {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LevelRaised => "level-raised",
            Self::NotClosed => "not-closed",
            Self::SpaceErrors => "space-errors",
            Self::Version => "version",
            Self::Header => "header",
            Self::ByteOrder => "byte-order",
            Self::L1Count => "l1-count",
            Self::L2Invalid => "l2-invalid",
            Self::TrackInvalid => "track-invalid",
            Self::TrackBeyondDevice => "track-beyond-device",
            Self::Overlap => "overlap",
            Self::FreeCounters => "free-counters",
            Self::FreeList => "free-list",
            Self::LostData => "lost-data",
            Self::Unsupported => "unsupported-compression",
            Self::Recovered => "recovered",
            Self::Lost => "lost",
            Self::L2Rebuilt => "l2-rebuilt",
            Self::L2Released => "l2-released",
            Self::FreeRebuilt => "free-rebuilt",
            Self::ReadOnlyEquivalent => "read-only-equivalent"
        }
    }
}

#[derive(Debug,Clone,PartialEq,Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Code,
    pub message: String
}

impl fmt::Display for Diagnostic {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{:?} [{}] {}",self.severity,self.code.as_str(),self.message)
    }
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum Outcome {
    Clean,
    SpaceRebuilt,
    Recovered
}

impl Outcome {
    pub fn status(&self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::SpaceRebuilt => 1,
            Self::Recovered => 2
        }
    }
}

#[derive(Debug,Clone)]
pub struct CheckReport {
    pub outcome: Outcome,
    /// level the run ended at
    pub level: i32,
    pub recovered: Vec<u32>,
    pub lost: Vec<u32>,
    /// tracks using a codec that is not compiled in
    pub unsupported: Vec<u32>,
    /// level 1 indices of the level 2 tables that were rebuilt
    pub rebuilt_l2: Vec<u32>,
    pub free: FreeStats,
    /// repairs were needed but withheld, e.g. unsupported compression
    pub read_only_equivalent: bool,
    pub diagnostics: Vec<Diagnostic>
}

impl CheckReport {
    pub fn status(&self) -> i32 {
        self.outcome.status()
    }
    pub fn to_json(&self,indent: Option<u16>) -> String {
        let mut ans = json::JsonValue::new_object();
        ans["status"] = self.status().into();
        ans["level"] = self.level.into();
        ans["recovered"] = self.recovered.clone().into();
        ans["lost"] = self.lost.clone().into();
        ans["unsupported"] = self.unsupported.clone().into();
        ans["rebuilt_l2"] = self.rebuilt_l2.clone().into();
        ans["read_only_equivalent"] = self.read_only_equivalent.into();
        ans["free"]["total"] = self.free.total.into();
        ans["free"]["largest"] = self.free.largest.into();
        ans["free"]["number"] = self.free.number.into();
        ans["free"]["imbed"] = self.free.imbed.into();
        let mut diags = json::JsonValue::new_array();
        for d in &self.diagnostics {
            let mut obj = json::JsonValue::new_object();
            obj["severity"] = format!("{:?}",d.severity).to_lowercase().into();
            obj["code"] = d.code.as_str().into();
            obj["message"] = d.message.clone().into();
            // push only fails if not an array
            let _ = diags.push(obj);
        }
        ans["diagnostics"] = diags;
        match indent {
            Some(spaces) => json::stringify_pretty(ans,spaces),
            None => json::stringify(ans)
        }
    }
}

/// Exit status of a run, -1 for a fatal error
pub fn status_of(result: &Result<CheckReport,Error>) -> i32 {
    match result {
        Ok(report) => report.status(),
        Err(_) => -1
    }
}

/// Check and repair an image at the requested level
pub fn chkdsk<S: Storage>(img: &mut CckdImage<S>,opts: CheckOptions) -> Result<CheckReport,Error> {
    let mut checker = Checker::new(img,opts);
    match checker.run() {
        Ok(report) => Ok(report),
        Err(e) => {
            error!("check failed: {}",e);
            Err(e)
        }
    }
}

/// Working state of one run
pub(super) struct Checker<'a,S: Storage> {
    pub(super) img: &'a mut CckdImage<S>,
    pub(super) level: i32,
    pub(super) read_only: bool,
    pub(super) read_only_equivalent: bool,
    /// header counters or sizes are inconsistent
    pub(super) hdr_err: bool,
    pub(super) rebuild_free: bool,
    pub(super) lost_data: bool,
    /// device header geometry was taken from the device type
    pub(super) devhdr_fixed: bool,
    pub(super) l1: Vec<u32>,
    pub(super) l2s: Vec<Option<L2Table>>,
    pub(super) space: SpaceTable,
    pub(super) bad_l2: BTreeSet<u32>,
    pub(super) bad_trks: BTreeSet<u32>,
    /// level 1 slots whose table must be rebuilt
    pub(super) touched: BTreeSet<u32>,
    pub(super) recovered: Vec<u32>,
    pub(super) lost: Vec<u32>,
    pub(super) unsupported: BTreeSet<u32>,
    pub(super) rebuilt_l2: Vec<u32>,
    pub(super) released_l2: Vec<u32>,
    pub(super) free_rebuilt: bool,
    /// the old read-write bit has been set and written
    pub(super) dirty: bool,
    pub(super) diags: Vec<Diagnostic>
}

impl<'a,S: Storage> Checker<'a,S> {
    fn new(img: &'a mut CckdImage<S>,opts: CheckOptions) -> Self {
        let file_len = img.file_len();
        let numl1tab = img.cdevhdr.numl1tab;
        Self {
            img,
            level: opts.level.clamp(MIN_LEVEL,MAX_LEVEL),
            read_only: opts.read_only,
            read_only_equivalent: false,
            hdr_err: false,
            rebuild_free: false,
            lost_data: false,
            devhdr_fixed: false,
            l1: Vec::new(),
            l2s: Vec::new(),
            space: SpaceTable::with_headers(numl1tab,file_len),
            bad_l2: BTreeSet::new(),
            bad_trks: BTreeSet::new(),
            touched: BTreeSet::new(),
            recovered: Vec::new(),
            lost: Vec::new(),
            unsupported: BTreeSet::new(),
            rebuilt_l2: Vec::new(),
            released_l2: Vec::new(),
            free_rebuilt: false,
            dirty: false,
            diags: Vec::new()
        }
    }
    fn run(&mut self) -> Result<CheckReport,Error> {
        info!("checking image at level {}",self.level);
        self.check_headers()?;
        loop {
            self.load_index()?;
            if self.scan_space() {
                continue;
            }
            if self.level >= 1 {
                self.reconcile_free()?;
            }
            if self.level >= 2 {
                self.validate_tracks()?;
            }
            break;
        }
        if self.level >= MAX_LEVEL || !self.bad_l2.is_empty() || !self.bad_trks.is_empty() || self.lost_data {
            self.recover()?;
        }
        if !self.unsupported.is_empty() && (self.rebuild_free || !self.touched.is_empty() || !self.recovered.is_empty()) {
            self.read_only_equivalent = true;
            self.diag(Severity::Warning,Code::ReadOnlyEquivalent,format!(
                "{} tracks use compression that is not available, repairs are withheld",self.unsupported.len()));
        }
        if !self.touched.is_empty() || !self.recovered.is_empty() {
            self.rebuild_index()?;
        }
        if self.rebuild_free && self.level >= 0 {
            self.rebuild_free_space()?;
        }
        self.finalize()
    }
    pub(super) fn diag(&mut self,severity: Severity,code: Code,message: String) {
        match severity {
            Severity::Info => info!("{}",message),
            Severity::Warning => warn!("{}",message),
            Severity::Error => error!("{}",message)
        }
        self.diags.push(Diagnostic { severity, code, message });
    }
    /// Raise the level, returns true if it actually went up
    pub(super) fn escalate(&mut self,level: i32,why: &str) -> bool {
        if level > self.level {
            self.diag(Severity::Warning,Code::LevelRaised,format!("check level raised from {} to {}: {}",self.level,level,why));
            self.level = level;
            return true;
        }
        false
    }
    /// Writes are allowed in this run
    pub(super) fn writable(&self) -> bool {
        !self.read_only && !self.read_only_equivalent
    }
    /// Set the old read-write bit on disk before the first structural write
    pub(super) fn begin_write(&mut self) -> Result<(),Error> {
        if !self.dirty {
            self.dirty = true;
            self.img.cdevhdr.options |= dasd::OPT_ORDWR;
            self.img.write_cdevhdr()?;
        }
        Ok(())
    }
    pub(super) fn mark_l2(&mut self,l1x: u32,why: String) {
        self.diag(Severity::Error,Code::L2Invalid,format!("level 2 table {}: {}",l1x,why));
        self.bad_l2.insert(l1x);
        self.touched.insert(l1x);
        self.rebuild_free = true;
    }
    pub(super) fn mark_trk(&mut self,trk: u32,why: String) {
        self.diag(Severity::Error,Code::TrackInvalid,format!("track {}: {}",trk,why));
        self.bad_trks.insert(trk);
        self.touched.insert(trk / dasd::L2_ENTRIES as u32);
        self.space.take_track(trk);
        self.rebuild_free = true;
    }
    fn header_fault(&mut self,why: String) {
        self.diag(Severity::Warning,Code::Header,why);
        self.hdr_err = true;
        self.rebuild_free = true;
    }

    /// Phase 1, headers and byte order
    fn check_headers(&mut self) -> Result<(),Error> {
        if self.img.endian()!=dasd::host_endian() {
            if self.read_only {
                self.diag(Severity::Info,Code::ByteOrder,"byte order differs from host, left alone in read-only mode".to_string());
            } else {
                endian::swap(self.img)?;
                self.diag(Severity::Info,Code::ByteOrder,"image converted to host byte order".to_string());
            }
        }
        let devtype = self.img.devtype;
        let heads = match devtype.media {
            Media::Ckd => devtype.heads,
            Media::Fba => track::FBA_BLOCK_NUM
        };
        let trksize = devtype.trksize();
        if self.img.devhdr.heads!=heads || self.img.devhdr.trksize!=trksize {
            self.header_fault(format!("device header has {} heads and track size {}, {} has {} and {}",
                self.img.devhdr.heads,self.img.devhdr.trksize,devtype.name,heads,trksize));
            self.img.devhdr.heads = heads;
            self.img.devhdr.trksize = trksize;
            self.img.geo = Geometry::new(self.img.id,&self.img.devhdr,&self.img.cdevhdr);
            self.devhdr_fixed = true;
        }
        let hdr = self.img.cdevhdr.clone();
        let file_len = self.img.file_len();
        if hdr.vrm[0]!=dasd::VERSION[0] || hdr.vrm[1] > dasd::VERSION[1] {
            self.diag(Severity::Warning,Code::Version,format!("image version {}.{}.{}",hdr.vrm[0],hdr.vrm[1],hdr.vrm[2]));
        }
        if self.img.l1_end() > file_len {
            return Err(Error::Structure(format!("level 1 table of {} entries runs past end of file",hdr.numl1tab)));
        }
        if hdr.numl2tab!=dasd::L2_ENTRIES as u32 {
            self.header_fault(format!("level 2 table size {} is not {}",hdr.numl2tab,dasd::L2_ENTRIES));
        }
        if self.img.geo.tracks==0 {
            // go by the level 1 table instead
            let tracks = hdr.numl1tab.saturating_mul(dasd::L2_ENTRIES as u32);
            self.img.geo.tracks = tracks;
            self.img.geo.cyls = match self.img.geo.media {
                Media::Ckd => tracks / u32::max(self.img.geo.heads,1),
                Media::Fba => tracks.saturating_mul(track::FBA_BLOCK_NUM)
            };
            self.header_fault(format!("device size is 0, assuming {} tracks",tracks));
        }
        match self.img.geo.l1_fit(hdr.numl1tab) {
            L1Fit::Exact => {},
            L1Fit::Tolerated => self.diag(Severity::Info,Code::L1Count,format!("level 1 table has {} entries, {} expected",
                hdr.numl1tab,self.img.geo.l1_expected())),
            L1Fit::Mismatch => {
                let expected = self.img.geo.l1_expected();
                self.diag(Severity::Warning,Code::L1Count,format!("level 1 table has {} entries, {} expected",hdr.numl1tab,expected));
                self.hdr_err = true;
                self.rebuild_free = true;
            }
        }
        if hdr.size as u64!=file_len {
            self.header_fault(format!("header size {} but file size {}",hdr.size,file_len));
        }
        for fault in hdr.free_space_faults() {
            self.header_fault(fault);
        }
        if self.hdr_err {
            self.escalate(1,"header is inconsistent");
        }
        if hdr.options & dasd::OPT_OPENED > 0 {
            self.diag(Severity::Warning,Code::NotClosed,"image was not closed".to_string());
            self.escalate(1,"image was not closed");
        }
        if hdr.options & dasd::OPT_SPERRS > 0 {
            self.diag(Severity::Warning,Code::SpaceErrors,"space errors were flagged".to_string());
            self.rebuild_free = true;
            self.escalate(1,"space errors were flagged");
        }
        Ok(())
    }

    /// Phase 2, load the lookup tables and build the space table
    fn load_index(&mut self) -> Result<(),Error> {
        let numl1tab = self.img.cdevhdr.numl1tab;
        let file_len = self.img.file_len();
        let l1_end = self.img.l1_end();
        self.space = SpaceTable::with_headers(numl1tab,file_len);
        self.l1 = self.img.read_l1()?;
        self.l2s = vec![None;self.l1.len()];
        if self.level >= MAX_LEVEL {
            debug!("level 2 tables are ignored at level {}",self.level);
            self.touched.extend(0..numl1tab);
            return Ok(());
        }
        for l1x in 0..self.l1.len() {
            let entry = self.l1[l1x];
            let pos = entry as u64;
            let l1x = l1x as u32;
            if dasd::l1_is_null(entry) || self.bad_l2.contains(&l1x) {
                continue;
            }
            if pos < l1_end || pos + dasd::L2_TABLE_SIZE > file_len {
                self.mark_l2(l1x,format!("position {:#x} is out of bounds",pos));
                continue;
            }
            self.space.push(Space::new(SpaceKind::L2 { l1x },pos,dasd::L2_TABLE_SIZE,dasd::L2_TABLE_SIZE));
            if self.level < 0 {
                continue;
            }
            let table = self.img.read_l2(pos)?;
            self.load_entries(l1x,&table);
            self.l2s[l1x as usize] = Some(table);
        }
        self.space.sort();
        Ok(())
    }
    fn load_entries(&mut self,l1x: u32,table: &L2Table) {
        let file_len = self.img.file_len();
        let l1_end = self.img.l1_end();
        let max_len = self.img.geo.max_image_len() as u64;
        for (l2x,e) in table.entries.iter().enumerate() {
            if !e.is_live() {
                continue;
            }
            let trk = l1x * dasd::L2_ENTRIES as u32 + l2x as u32;
            if self.bad_trks.contains(&trk) {
                continue;
            }
            if trk >= self.img.geo.tracks {
                if self.touched.insert(l1x) {
                    self.diag(Severity::Warning,Code::TrackBeyondDevice,format!("level 2 table {} has entries beyond the device",l1x));
                }
                self.rebuild_free = true;
                continue;
            }
            let (pos,len,siz) = (e.pos as u64,e.len as u64,e.size as u64);
            let why = if len < TRKHDR_SIZE as u64 {
                Some(format!("length {} is too short",len))
            } else if len > siz {
                Some(format!("length {} exceeds size {}",len,siz))
            } else if len > max_len {
                Some(format!("length {} exceeds the largest image",len))
            } else if pos < l1_end || pos + siz > file_len {
                Some(format!("position {:#x} is out of bounds",pos))
            } else {
                None
            };
            match why {
                Some(why) => self.mark_trk(trk,why),
                None => self.space.push(Space::new(SpaceKind::Trk { trk, recovered: false },pos,len,siz))
            }
        }
    }

    /// Phase 3, overlaps and free space counters, returns true if the passes must restart
    fn scan_space(&mut self) -> bool {
        self.space.sort();
        let overlaps = self.space.overlaps();
        if !overlaps.is_empty() {
            let mut newly_marked = false;
            let pairs: Vec<(Space,Space)> = overlaps.iter()
                .map(|(a,b)| (self.space.entries()[*a],self.space.entries()[*b])).collect();
            for (a,b) in pairs {
                self.diag(Severity::Error,Code::Overlap,format!("{:?} at {:#x} overlaps {:?} at {:#x}",a.kind,a.pos,b.kind,b.pos));
                for s in [a,b] {
                    match s.kind {
                        SpaceKind::Trk { trk, .. } if !self.bad_trks.contains(&trk) => {
                            self.mark_trk(trk,"overlaps other data".to_string());
                            newly_marked = true;
                        },
                        SpaceKind::L2 { l1x } if !self.bad_l2.contains(&l1x) => {
                            self.mark_l2(l1x,"overlaps other data".to_string());
                            newly_marked = true;
                        },
                        _ => {}
                    }
                }
            }
            let raised = self.escalate(3,"overlapping space");
            if newly_marked || raised {
                return true;
            }
        }
        if self.level < 0 {
            return false;
        }
        let stats = self.space.free_stats();
        let hdr = &self.img.cdevhdr;
        let expected = FreeStats {
            total: hdr.free_total as u64,
            largest: hdr.free_largest as u64,
            number: hdr.free_number as u64,
            imbed: hdr.free_imbed as u64
        };
        let hdr_used = hdr.used as u64;
        if stats!=expected {
            self.diag(Severity::Warning,Code::FreeCounters,format!("free space counters {:?} but found {:?}",expected,stats));
            self.rebuild_free = true;
        }
        // bytes the header says are in use must be found before free space is rebuilt over them,
        // stale counters included
        let used = self.space.used();
        if used < hdr_used {
            if !self.lost_data {
                self.diag(Severity::Error,Code::LostData,format!("{} bytes in use are not reachable",hdr_used - used));
            }
            self.lost_data = true;
            self.rebuild_free = true;
            if self.escalate(3,"data is not reachable") {
                return true;
            }
        }
        false
    }

    /// Phase 4, the free space list must describe exactly the gaps
    fn reconcile_free(&mut self) -> Result<(),Error> {
        let gaps: Vec<(u64,u64)> = self.space.gaps().iter().map(|g| (g.pos,g.len)).collect();
        let why = match self.img.read_free_list() {
            Ok(list) => {
                let mut found = list.extents().to_vec();
                found.sort();
                if found==gaps && found.len() as u64==self.img.cdevhdr.free_number as u64 {
                    None
                } else {
                    Some(match list {
                        FreeList::Empty => format!("no free space list but {} gaps",gaps.len()),
                        _ => format!("free space list has {} entries, {} gaps found",found.len(),gaps.len())
                    })
                }
            },
            Err(e) if e.is_io() => return Err(e),
            Err(e) => Some(e.to_string())
        };
        if let Some(why) = why {
            self.diag(Severity::Warning,Code::FreeList,why);
            self.rebuild_free = true;
        }
        Ok(())
    }

    /// Phase 5, track image headers and, at level 3, contents
    fn validate_tracks(&mut self) -> Result<(),Error> {
        let full = self.level >= 3;
        let trks: Vec<Space> = self.space.tracks().cloned().collect();
        for s in trks {
            let trk = match s.track() {
                Some(t) => t,
                None => continue
            };
            let stored = self.img.read_bytes(s.pos,s.len as usize,"read track image")?;
            match self.check_image(trk,&stored,full) {
                Verdict::Good => {},
                Verdict::Unsupported(kind) => {
                    self.diag(Severity::Warning,Code::Unsupported,format!("track {} uses {} compression which is not available",trk,kind));
                    self.unsupported.insert(trk);
                },
                Verdict::Bad(why) => self.mark_trk(trk,why)
            }
        }
        Ok(())
    }
    pub(super) fn check_image(&self,trk: u32,stored: &[u8],full: bool) -> Verdict {
        let geo = &self.img.geo;
        let hdr = match TrackHeader::parse(geo.media,stored) {
            Some(h) => h,
            None => return Verdict::Bad("image is too short".to_string())
        };
        let kind = match Kind::from_tag(hdr.tag) {
            Some(k) => k,
            None => return Verdict::Bad(format!("invalid compression tag {}",hdr.tag))
        };
        if geo.track_of(hdr.addr)!=Some(trk) {
            return Verdict::Bad(format!("header address {:?} does not match",hdr.addr));
        }
        if !full {
            return Verdict::Good;
        }
        if !kind.supported() {
            return Verdict::Unsupported(kind);
        }
        let image = match track::expand(geo.media,stored,geo.max_image_len()) {
            Ok(i) => i,
            Err(e) => return Verdict::Bad(e.to_string())
        };
        match track::validate(geo,trk,&image) {
            Ok(()) => Verdict::Good,
            Err(fault) => Verdict::Bad(fault.to_string())
        }
    }

    /// Phase 9, close out the header and produce the report
    fn finalize(&mut self) -> Result<CheckReport,Error> {
        let index_work = !self.recovered.is_empty() || !self.rebuilt_l2.is_empty() || !self.released_l2.is_empty()
            || !self.lost.is_empty();
        let outcome = if index_work {
            Outcome::Recovered
        } else if self.free_rebuilt {
            Outcome::SpaceRebuilt
        } else {
            Outcome::Clean
        };
        if self.writable() {
            if self.devhdr_fixed {
                self.begin_write()?;
                self.img.write_devhdr()?;
            }
            let mut hdr = self.img.cdevhdr.clone();
            hdr.options &= !(dasd::OPT_OPENED | dasd::OPT_SPERRS);
            hdr.vrm = dasd::VERSION;
            if hdr!=self.img.cdevhdr || self.dirty {
                self.img.cdevhdr = hdr;
                self.img.write_cdevhdr()?;
            }
            self.img.flush()?;
        }
        let free = FreeStats {
            total: self.img.cdevhdr.free_total as u64,
            largest: self.img.cdevhdr.free_largest as u64,
            number: self.img.cdevhdr.free_number as u64,
            imbed: self.img.cdevhdr.free_imbed as u64
        };
        info!("check finished at level {} with status {}",self.level,outcome.status());
        Ok(CheckReport {
            outcome,
            level: self.level,
            recovered: self.recovered.clone(),
            lost: self.lost.clone(),
            unsupported: self.unsupported.iter().cloned().collect(),
            rebuilt_l2: self.rebuilt_l2.clone(),
            free,
            read_only_equivalent: self.read_only_equivalent,
            diagnostics: self.diags.clone()
        })
    }
}

pub(super) enum Verdict {
    Good,
    Unsupported(Kind),
    Bad(String)
}
