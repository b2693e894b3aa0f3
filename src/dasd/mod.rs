//! # DASD Structures
//!
//! A compressed image is laid out as follows.
//!
//! * device header at offset 0, 512 bytes, always little-endian
//! * compressed device header at offset 512, 512 bytes
//! * level 1 table at offset 1024, one 4 byte entry per 256 tracks
//! * everything else is free-form, found only through the level 1 and level 2 tables
//!
//! The compressed header, the level 1 and level 2 tables, and the free space
//! structures all share one byte order, which is recorded by the `OPT_BIGENDIAN` bit
//! of the compressed header.  The structures here carry no endian attribute of their
//! own, so the caller supplies the order when reading or writing with `binrw`.
//!
//! Track and block-group images are located by the level 2 entries.  Each image starts with
//! a 5 byte header (compression tag plus address), see the `track` module.

pub mod names;
pub mod track;
pub mod codec;

use binrw::{BinRead,BinWrite,Endian};
use std::fmt;
use track::{TrackAddr,FBA_BLOCK_NUM,FBA_BLOCK_SIZE,TRKHDR_SIZE};

pub const DEVHDR_POS: u64 = 0;
pub const DEVHDR_SIZE: u64 = 512;
pub const CDEVHDR_POS: u64 = 512;
pub const CDEVHDR_SIZE: u64 = 512;
pub const L1_POS: u64 = 1024;
pub const L1_ENTRY_SIZE: u64 = 4;
pub const L2_ENTRIES: usize = 256;
pub const L2_ENTRY_SIZE: u64 = 8;
pub const L2_TABLE_SIZE: u64 = L2_ENTRIES as u64 * L2_ENTRY_SIZE;
pub const FREEBLK_SIZE: u64 = 8;
/// Marks the new (array) format of the free space list
pub const FREE_MAGIC: [u8;8] = *b"FREE_BLK";
/// version, release, modification level stamped on every rewrite
pub const VERSION: [u8;3] = [0,3,1];

pub const OPT_NOFUDGE: u8 = 0x01;
pub const OPT_BIGENDIAN: u8 = 0x02;
/// space errors were detected while the image was open
pub const OPT_SPERRS: u8 = 0x20;
/// old read-write; set before a structural rewrite begins
pub const OPT_ORDWR: u8 = 0x40;
pub const OPT_OPENED: u8 = 0x80;

pub const L1_NULL: u32 = 0;
pub const L1_SHADOW_NULL: u32 = 0xffff_ffff;

/// Enumerates engine errors.  The `Display` trait will print equivalent long message.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("{op} failed at offset {pos:#x}: {source}")]
    Io {
        op: &'static str,
        pos: u64,
        #[source]
        source: std::io::Error
    },
    #[error("device identifier not recognized")]
    UnknownDevice,
    #[error("device type {0:#04x} not found")]
    UnknownDeviceType(u8),
    #[error("device type `{0}` not recognized")]
    UnknownDeviceName(String),
    #[error("structure error: {0}")]
    Structure(String),
    #[error("space at {pos:#x} overlaps space at {next:#x}")]
    Overlap {
        pos: u64,
        next: u64
    },
    #[error("image cannot be compacted: {0}")]
    NotCompactable(String),
    #[error("no free space large enough for a level 2 table")]
    NoSpaceForL2,
    #[error("free space list cannot be written")]
    FreeListUnwritable,
    #[error("compression tag {0} is not supported")]
    UnsupportedCompression(u8),
    #[error("track {0} is out of range")]
    TrackRange(u32),
    #[error("track image could not be decoded")]
    BadTrackImage
}

impl Error {
    /// Map an I/O error, tagging it with the operation and offset
    pub fn io(op: &'static str,pos: u64) -> impl FnOnce(std::io::Error) -> Error {
        move |source| Error::Io { op, pos, source }
    }
    /// Map a `binrw` error; I/O failures keep their kind, anything else is structural
    pub fn brw(op: &'static str,pos: u64) -> impl FnOnce(binrw::Error) -> Error {
        move |e| match e {
            binrw::Error::Io(source) => Error::Io { op, pos, source },
            other => Error::Structure(format!("{} at {:#x}: {}",op,pos,other))
        }
    }
    /// true if this error stops the run outright regardless of check level
    pub fn is_io(&self) -> bool {
        matches!(self,Error::Io { .. })
    }
}

#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum Media {
    Ckd,
    Fba
}

/// The four recognized device identifiers (media × base/shadow)
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum DeviceId {
    CkdBase,
    CkdShadow,
    FbaBase,
    FbaShadow
}

impl DeviceId {
    pub fn from_devid(devid: &[u8;8]) -> Option<Self> {
        match devid {
            b"CKD_C370" => Some(Self::CkdBase),
            b"CKD_S370" => Some(Self::CkdShadow),
            b"FBA_C370" => Some(Self::FbaBase),
            b"FBA_S370" => Some(Self::FbaShadow),
            _ => None
        }
    }
    pub fn devid(&self) -> [u8;8] {
        match self {
            Self::CkdBase => *b"CKD_C370",
            Self::CkdShadow => *b"CKD_S370",
            Self::FbaBase => *b"FBA_C370",
            Self::FbaShadow => *b"FBA_S370"
        }
    }
    pub fn media(&self) -> Media {
        match self {
            Self::CkdBase | Self::CkdShadow => Media::Ckd,
            Self::FbaBase | Self::FbaShadow => Media::Fba
        }
    }
    pub fn is_shadow(&self) -> bool {
        matches!(self,Self::CkdShadow | Self::FbaShadow)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{}",String::from_utf8_lossy(&self.devid()))
    }
}

/// The byte order the host would write
pub fn host_endian() -> Endian {
    if cfg!(target_endian = "big") {
        Endian::Big
    } else {
        Endian::Little
    }
}

pub fn opposite(endian: Endian) -> Endian {
    match endian {
        Endian::Big => Endian::Little,
        Endian::Little => Endian::Big
    }
}

/// Device header, fixed at offset 0
#[derive(BinRead,BinWrite,Debug,Clone,PartialEq)]
#[brw(little)]
pub struct DevHeader {
    pub devid: [u8;8],
    pub heads: u32,
    pub trksize: u32,
    pub devtype: u8,
    pub fileseq: u8,
    pub highcyl: u16,
    pub resv: [u8;492]
}

impl DevHeader {
    pub fn new(id: DeviceId,heads: u32,trksize: u32,devtype: u8) -> Self {
        Self {
            devid: id.devid(),
            heads,
            trksize,
            devtype,
            fileseq: 0,
            highcyl: 0,
            resv: [0;492]
        }
    }
}

/// Compressed device header, fixed at offset 512, stored in the image byte order
#[derive(BinRead,BinWrite,Debug,Clone,PartialEq)]
pub struct CompressedHeader {
    pub vrm: [u8;3],
    pub options: u8,
    pub numl1tab: u32,
    pub numl2tab: u32,
    /// file size
    pub size: u32,
    /// bytes occupied by headers, tables, and the used length of every image
    pub used: u32,
    /// position of the free space list, 0 if there is none
    pub free: u32,
    pub free_total: u32,
    pub free_largest: u32,
    pub free_number: u32,
    pub free_imbed: u32,
    /// cylinders (CKD) or sectors (FBA)
    pub cyls: u32,
    pub nullfmt: u8,
    pub compress: u8,
    pub compress_parm: i16,
    pub resv: [u8;464]
}

impl CompressedHeader {
    pub fn new(numl1tab: u32,cyls: u32,nullfmt: u8,big_endian: bool) -> Self {
        let size = (L1_POS + numl1tab as u64 * L1_ENTRY_SIZE) as u32;
        Self {
            vrm: VERSION,
            options: match big_endian { true => OPT_BIGENDIAN, false => 0 },
            numl1tab,
            numl2tab: L2_ENTRIES as u32,
            size,
            used: size,
            free: 0,
            free_total: 0,
            free_largest: 0,
            free_number: 0,
            free_imbed: 0,
            cyls,
            nullfmt,
            compress: 0,
            compress_parm: 0,
            resv: [0;464]
        }
    }
    /// byte order of everything but the device header, the options byte can be read in either order
    pub fn endian(&self) -> Endian {
        endian_of_options(self.options)
    }
    pub fn l1_end(&self) -> u64 {
        L1_POS + self.numl1tab as u64 * L1_ENTRY_SIZE
    }
    /// Describe every violated free space relation, empty if the counters are consistent.
    pub fn free_space_faults(&self) -> Vec<String> {
        let mut ans = Vec::new();
        if self.size as u64 != self.used as u64 + self.free_total as u64 {
            ans.push(format!("size {} is not used {} plus free {}",self.size,self.used,self.free_total));
        }
        if self.free_total < self.free_imbed {
            ans.push(format!("free total {} is less than imbedded free {}",self.free_total,self.free_imbed));
        } else if self.free_largest > self.free_total - self.free_imbed {
            ans.push(format!("largest free {} exceeds free space outside of images",self.free_largest));
        }
        if (self.free==0) != (self.free_number==0) {
            ans.push(format!("free list position {:#x} disagrees with free count {}",self.free,self.free_number));
        }
        ans
    }
}

pub fn endian_of_options(options: u8) -> Endian {
    match options & OPT_BIGENDIAN {
        0 => Endian::Little,
        _ => Endian::Big
    }
}

/// Is this level 1 entry one of the two sentinels
pub fn l1_is_null(entry: u32) -> bool {
    entry==L1_NULL || entry==L1_SHADOW_NULL
}

pub fn l1_sentinel(shadow: bool) -> u32 {
    match shadow {
        true => L1_SHADOW_NULL,
        false => L1_NULL
    }
}

/// Level 2 entry, one per track or block group
#[derive(BinRead,BinWrite,Debug,Clone,Copy,PartialEq,Eq,Default)]
pub struct L2Entry {
    pub pos: u32,
    /// stored (compressed) length
    pub len: u16,
    /// allocated size, anything beyond `len` is imbedded free space
    pub size: u16
}

impl L2Entry {
    pub fn null(shadow: bool,nullfmt: u8) -> Self {
        match shadow {
            true => Self { pos: u32::MAX, len: u16::MAX, size: u16::MAX },
            false => Self { pos: 0, len: nullfmt as u16, size: nullfmt as u16 }
        }
    }
    /// Does this entry point at a stored image
    pub fn is_live(&self) -> bool {
        self.pos!=0 && self.pos!=u32::MAX
    }
}

/// Level 2 table, one per 256 tracks or block groups
#[derive(BinRead,BinWrite,Debug,Clone,PartialEq)]
pub struct L2Table {
    pub entries: [L2Entry;L2_ENTRIES]
}

impl L2Table {
    pub fn null(shadow: bool,nullfmt: u8) -> Self {
        Self {
            entries: [L2Entry::null(shadow,nullfmt);L2_ENTRIES]
        }
    }
    /// A table made only of null entries is semantically absent
    pub fn is_null(&self,shadow: bool,nullfmt: u8) -> bool {
        let null = L2Entry::null(shadow,nullfmt);
        self.entries.iter().all(|e| *e==null)
    }
    pub fn live_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_live()).count()
    }
}

/// Free block, either a node of the old chained list or an element of the new array
#[derive(BinRead,BinWrite,Debug,Clone,Copy,PartialEq,Eq,Default)]
pub struct FreeBlock {
    pub pos: u32,
    pub len: u32
}

/// How the level 1 entry count relates to the device size
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum L1Fit {
    Exact,
    /// off by one, accepted for images written by older releases
    Tolerated,
    Mismatch
}

/// Device geometry as derived from the two headers
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub struct Geometry {
    pub media: Media,
    pub shadow: bool,
    pub heads: u32,
    /// cylinders (CKD) or sectors (FBA)
    pub cyls: u32,
    pub trksize: u32,
    /// tracks (CKD) or block groups (FBA)
    pub tracks: u32
}

impl Geometry {
    pub fn new(id: DeviceId,devhdr: &DevHeader,cdevhdr: &CompressedHeader) -> Self {
        let media = id.media();
        let tracks = match media {
            Media::Ckd => cdevhdr.cyls.saturating_mul(devhdr.heads),
            Media::Fba => cdevhdr.cyls.div_ceil(FBA_BLOCK_NUM)
        };
        Self {
            media,
            shadow: id.is_shadow(),
            heads: devhdr.heads,
            cyls: cdevhdr.cyls,
            trksize: devhdr.trksize,
            tracks
        }
    }
    /// level 1 entries needed to cover the device
    pub fn l1_expected(&self) -> u32 {
        self.tracks.div_ceil(L2_ENTRIES as u32)
    }
    pub fn l1_fit(&self,numl1tab: u32) -> L1Fit {
        let expected = self.l1_expected();
        if numl1tab==expected {
            L1Fit::Exact
        } else if numl1tab.abs_diff(expected)==1 {
            L1Fit::Tolerated
        } else {
            L1Fit::Mismatch
        }
    }
    /// Largest stored or decoded image, including the 5 byte header
    pub fn max_image_len(&self) -> usize {
        match self.media {
            Media::Ckd => self.trksize as usize,
            Media::Fba => TRKHDR_SIZE + FBA_BLOCK_SIZE
        }
    }
    pub fn track_addr(&self,trk: u32) -> TrackAddr {
        match self.media {
            Media::Ckd => TrackAddr::CH((trk / self.heads) as u16,(trk % self.heads) as u16),
            Media::Fba => TrackAddr::Group(trk)
        }
    }
    /// Track number of an image header address, or None if out of range
    pub fn track_of(&self,addr: TrackAddr) -> Option<u32> {
        match (self.media,addr) {
            (Media::Ckd,TrackAddr::CH(c,h)) if (c as u32) < self.cyls && (h as u32) < self.heads => {
                (c as u32).checked_mul(self.heads)?.checked_add(h as u32).filter(|t| *t < self.tracks)
            },
            (Media::Fba,TrackAddr::Group(g)) if g < self.tracks => Some(g),
            _ => None
        }
    }
}

#[test]
fn l1_boundaries() {
    let mut cdevhdr = CompressedHeader::new(0,0,0,false);
    let devhdr = DevHeader::new(DeviceId::CkdBase,16,56832,0x90);
    // 32 cylinders of 16 heads is exactly two level 2 tables
    cdevhdr.cyls = 32;
    let geo = Geometry::new(DeviceId::CkdBase,&devhdr,&cdevhdr);
    assert_eq!(geo.tracks,512);
    assert_eq!(geo.l1_fit(2),L1Fit::Exact);
    assert_eq!(geo.l1_fit(3),L1Fit::Tolerated);
    assert_eq!(geo.l1_fit(4),L1Fit::Mismatch);
    // one track more needs one more entry, exactly
    let devhdr = DevHeader::new(DeviceId::CkdBase,1,56832,0x90);
    cdevhdr.cyls = 513;
    let geo = Geometry::new(DeviceId::CkdBase,&devhdr,&cdevhdr);
    assert_eq!(geo.l1_expected(),3);
    assert_eq!(geo.l1_fit(3),L1Fit::Exact);
}

#[test]
fn track_of_huge_heads() {
    let geo = Geometry { media: Media::Ckd, shadow: false, heads: u32::MAX, cyls: 10, trksize: 56832, tracks: 10 };
    assert_eq!(geo.track_of(TrackAddr::CH(0,5)),None);
    assert_eq!(geo.track_of(TrackAddr::CH(1,0)),None);
    let geo = Geometry { heads: 15, tracks: 150, ..geo };
    assert_eq!(geo.track_of(TrackAddr::CH(2,3)),Some(33));
}

#[test]
fn header_relations() {
    let mut hdr = CompressedHeader::new(1,1,0,false);
    assert!(hdr.free_space_faults().is_empty());
    hdr.size += 50;
    assert_eq!(hdr.free_space_faults().len(),1);
    hdr.free_total = 50;
    hdr.free_largest = 50;
    hdr.free_number = 1;
    assert_eq!(hdr.free_space_faults().len(),1);
    hdr.free = 2000;
    assert!(hdr.free_space_faults().is_empty());
    hdr.free_imbed = 10;
    assert_eq!(hdr.free_space_faults().len(),1);
}
