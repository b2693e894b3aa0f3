//! # Compressed Image Container
//!
//! `CckdImage` wraps some random access storage and exposes the headers, the lookup tables,
//! and the stored track images.  Storage is anything implementing `Storage`, which is a file
//! on the host or an in-memory buffer.
//!
//! All reads and writes go through helpers that tag I/O errors with the operation and
//! the file offset, so the tools can report where a failure happened.
//!
//! The image can also be built from scratch, which is how `mkdsk` and the tests make images:
//! `create` writes the headers and an empty level 1 table, and `append_track` adds images
//! at the end of the file, allocating level 2 tables as needed.

use std::io::{Read,Write,Seek,SeekFrom,Cursor};
use binrw::{BinRead,BinWrite,Endian};
use log::{debug,trace,info};
use crate::dasd::{self,Error,DeviceId,DevHeader,CompressedHeader,Geometry,L2Entry,L2Table,FreeBlock,Media};
use crate::dasd::names::{self,DeviceType};
use crate::dasd::track::{self,TRKHDR_SIZE};
use crate::dasd::codec::Kind;

/// Random access storage that can also be resized
pub trait Storage: Read + Write + Seek {
    fn set_len(&mut self,len: u64) -> std::io::Result<()>;
    fn byte_len(&mut self) -> std::io::Result<u64> {
        let cur = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(cur))?;
        Ok(end)
    }
}

impl Storage for std::fs::File {
    fn set_len(&mut self,len: u64) -> std::io::Result<()> {
        std::fs::File::set_len(self,len)
    }
}

impl Storage for Cursor<Vec<u8>> {
    fn set_len(&mut self,len: u64) -> std::io::Result<()> {
        self.get_mut().resize(len as usize,0);
        Ok(())
    }
    fn byte_len(&mut self) -> std::io::Result<u64> {
        Ok(self.get_ref().len() as u64)
    }
}

/// Free space list as found in the file
#[derive(Debug,Clone,PartialEq,Eq)]
pub enum FreeList {
    /// no list, header free position is 0
    Empty,
    /// `FREE_BLK` array at the given position
    Array(u64,Vec<(u64,u64)>),
    /// chain of nodes, each stored at the start of its gap
    Chain(Vec<(u64,u64)>)
}

impl FreeList {
    pub fn extents(&self) -> &[(u64,u64)] {
        match self {
            FreeList::Empty => &[],
            FreeList::Array(_,v) => v,
            FreeList::Chain(v) => v
        }
    }
}

pub struct CckdImage<S: Storage> {
    store: S,
    pub id: DeviceId,
    pub devtype: &'static DeviceType,
    pub devhdr: DevHeader,
    pub cdevhdr: CompressedHeader,
    pub geo: Geometry,
    file_len: u64
}

impl<S: Storage> CckdImage<S> {
    /// Open existing storage.  An unrecognized device identifier or device type is an error.
    pub fn open(mut store: S) -> Result<Self,Error> {
        let file_len = store.byte_len().map_err(Error::io("get file length",0))?;
        if file_len < dasd::L1_POS {
            return Err(Error::Structure(format!("file of {} bytes is too short for the headers",file_len)));
        }
        store.seek(SeekFrom::Start(dasd::DEVHDR_POS)).map_err(Error::io("seek device header",0))?;
        let devhdr = DevHeader::read(&mut store).map_err(Error::brw("read device header",dasd::DEVHDR_POS))?;
        let id = DeviceId::from_devid(&devhdr.devid).ok_or(Error::UnknownDevice)?;
        let devtype = names::lookup(id.media(),devhdr.devtype)?;
        // options byte is at the same place in either order, and tells us the order
        let mut opt = [0u8;4];
        store.seek(SeekFrom::Start(dasd::CDEVHDR_POS)).map_err(Error::io("seek compressed header",dasd::CDEVHDR_POS))?;
        store.read_exact(&mut opt).map_err(Error::io("read compressed header",dasd::CDEVHDR_POS))?;
        let endian = dasd::endian_of_options(opt[3]);
        store.seek(SeekFrom::Start(dasd::CDEVHDR_POS)).map_err(Error::io("seek compressed header",dasd::CDEVHDR_POS))?;
        let cdevhdr = CompressedHeader::read_options(&mut store,endian,())
            .map_err(Error::brw("read compressed header",dasd::CDEVHDR_POS))?;
        let geo = Geometry::new(id,&devhdr,&cdevhdr);
        debug!("opened {} image, device {}, {} tracks, {:?} byte order",id,devtype.name,geo.tracks,endian);
        Ok(Self { store, id, devtype, devhdr, cdevhdr, geo, file_len })
    }
    /// Create a new empty image on the storage, the storage is truncated first.
    /// For FBA devices `cyls` is the number of sectors.
    pub fn create(mut store: S,devtype: &'static DeviceType,cyls: u32,shadow: bool,big_endian: bool,nullfmt: u8) -> Result<Self,Error> {
        let id = match (devtype.media,shadow) {
            (Media::Ckd,false) => DeviceId::CkdBase,
            (Media::Ckd,true) => DeviceId::CkdShadow,
            (Media::Fba,false) => DeviceId::FbaBase,
            (Media::Fba,true) => DeviceId::FbaShadow
        };
        if cyls==0 {
            return Err(Error::Structure("device must have at least one cylinder or sector".to_string()));
        }
        let heads = match devtype.media {
            Media::Ckd => devtype.heads,
            Media::Fba => track::FBA_BLOCK_NUM
        };
        let devhdr = DevHeader::new(id,heads,devtype.trksize(),devtype.code);
        let provisional = CompressedHeader::new(0,cyls,nullfmt,big_endian);
        let numl1tab = Geometry::new(id,&devhdr,&provisional).l1_expected();
        let cdevhdr = CompressedHeader::new(numl1tab,cyls,nullfmt,big_endian);
        let geo = Geometry::new(id,&devhdr,&cdevhdr);
        store.set_len(0).map_err(Error::io("truncate",0))?;
        let mut ans = Self { store, id, devtype, devhdr, cdevhdr, geo, file_len: 0 };
        ans.write_devhdr()?;
        ans.write_cdevhdr()?;
        let l1 = vec![dasd::l1_sentinel(shadow);numl1tab as usize];
        ans.write_l1(&l1)?;
        info!("created {} image for {} with {} tracks",id,devtype.name,geo.tracks);
        Ok(ans)
    }
    pub fn into_inner(self) -> S {
        self.store
    }
    pub fn endian(&self) -> Endian {
        self.cdevhdr.endian()
    }
    pub fn file_len(&self) -> u64 {
        self.file_len
    }
    pub fn l1_end(&self) -> u64 {
        self.cdevhdr.l1_end()
    }
    pub fn read_bytes(&mut self,pos: u64,len: usize,op: &'static str) -> Result<Vec<u8>,Error> {
        let mut ans = vec![0;len];
        self.store.seek(SeekFrom::Start(pos)).map_err(Error::io(op,pos))?;
        self.store.read_exact(&mut ans).map_err(Error::io(op,pos))?;
        trace!("read {} bytes at {:#x}",len,pos);
        Ok(ans)
    }
    pub fn write_bytes(&mut self,pos: u64,buf: &[u8],op: &'static str) -> Result<(),Error> {
        self.store.seek(SeekFrom::Start(pos)).map_err(Error::io(op,pos))?;
        self.store.write_all(buf).map_err(Error::io(op,pos))?;
        self.file_len = u64::max(self.file_len,pos + buf.len() as u64);
        trace!("wrote {} bytes at {:#x}",buf.len(),pos);
        Ok(())
    }
    pub fn truncate(&mut self,len: u64) -> Result<(),Error> {
        self.store.set_len(len).map_err(Error::io("truncate",len))?;
        self.file_len = len;
        debug!("file truncated to {}",len);
        Ok(())
    }
    pub fn flush(&mut self) -> Result<(),Error> {
        self.store.flush().map_err(Error::io("flush",0))
    }
    pub fn read_struct<T>(&mut self,pos: u64,endian: Endian,op: &'static str) -> Result<T,Error>
    where T: for<'a> BinRead<Args<'a> = ()> {
        self.store.seek(SeekFrom::Start(pos)).map_err(Error::io(op,pos))?;
        T::read_options(&mut self.store,endian,()).map_err(Error::brw(op,pos))
    }
    pub fn write_struct<T>(&mut self,pos: u64,val: &T,endian: Endian,op: &'static str) -> Result<(),Error>
    where T: for<'a> BinWrite<Args<'a> = ()> {
        let mut curs = Cursor::new(Vec::new());
        val.write_options(&mut curs,endian,()).map_err(Error::brw(op,pos))?;
        self.write_bytes(pos,&curs.into_inner(),op)
    }
    pub fn write_devhdr(&mut self) -> Result<(),Error> {
        let hdr = self.devhdr.clone();
        self.write_struct(dasd::DEVHDR_POS,&hdr,Endian::Little,"write device header")
    }
    /// Write the in-memory compressed header in the image byte order
    pub fn write_cdevhdr(&mut self) -> Result<(),Error> {
        let hdr = self.cdevhdr.clone();
        let endian = hdr.endian();
        self.write_struct(dasd::CDEVHDR_POS,&hdr,endian,"write compressed header")
    }
    pub fn read_l1_as(&mut self,endian: Endian) -> Result<Vec<u32>,Error> {
        let n = self.cdevhdr.numl1tab as u64;
        if self.l1_end() > self.file_len {
            return Err(Error::Structure(format!("level 1 table of {} entries runs past end of file",n)));
        }
        let buf = self.read_bytes(dasd::L1_POS,(n * dasd::L1_ENTRY_SIZE) as usize,"read level 1 table")?;
        Ok(buf.chunks_exact(4).map(|c| {
            let b = [c[0],c[1],c[2],c[3]];
            match endian {
                Endian::Big => u32::from_be_bytes(b),
                Endian::Little => u32::from_le_bytes(b)
            }
        }).collect())
    }
    pub fn write_l1_as(&mut self,l1: &[u32],endian: Endian) -> Result<(),Error> {
        let buf: Vec<u8> = l1.iter().flat_map(|x| match endian {
            Endian::Big => x.to_be_bytes(),
            Endian::Little => x.to_le_bytes()
        }).collect();
        self.write_bytes(dasd::L1_POS,&buf,"write level 1 table")
    }
    pub fn read_l1(&mut self) -> Result<Vec<u32>,Error> {
        self.read_l1_as(self.endian())
    }
    pub fn write_l1(&mut self,l1: &[u32]) -> Result<(),Error> {
        self.write_l1_as(l1,self.endian())
    }
    pub fn read_l2(&mut self,pos: u64) -> Result<L2Table,Error> {
        self.read_struct(pos,self.endian(),"read level 2 table")
    }
    pub fn write_l2(&mut self,pos: u64,l2: &L2Table) -> Result<(),Error> {
        self.write_struct(pos,l2,self.endian(),"write level 2 table")
    }
    /// Load every level 2 table the level 1 table points at.
    /// A table that is not entirely inside the file is a structure error.
    pub fn read_l2_tables(&mut self,l1: &[u32]) -> Result<Vec<Option<L2Table>>,Error> {
        let mut ans = Vec::new();
        for (l1x,entry) in l1.iter().enumerate() {
            if dasd::l1_is_null(*entry) {
                ans.push(None);
                continue;
            }
            let pos = *entry as u64;
            if pos < self.l1_end() || pos + dasd::L2_TABLE_SIZE > self.file_len {
                return Err(Error::Structure(format!("level 2 table {} at {:#x} is out of bounds",l1x,pos)));
            }
            ans.push(Some(self.read_l2(pos)?));
        }
        Ok(ans)
    }
    /// Read the free space list the header points at.  Anything out of bounds or inconsistent
    /// is a structure error, I/O failures are passed through.
    pub fn read_free_list(&mut self) -> Result<FreeList,Error> {
        let hdr = self.cdevhdr.clone();
        if hdr.free==0 {
            return Ok(FreeList::Empty);
        }
        let endian = self.endian();
        let start = hdr.free as u64;
        if start + dasd::FREEBLK_SIZE > self.file_len {
            return Err(Error::Structure(format!("free space list at {:#x} is out of bounds",start)));
        }
        let magic = self.read_bytes(start,8,"read free space")?;
        if magic==dasd::FREE_MAGIC {
            let n = hdr.free_number as u64;
            if start + dasd::FREEBLK_SIZE * (n + 1) > self.file_len {
                return Err(Error::Structure(format!("free space array of {} entries runs past end of file",n)));
            }
            let mut blocks = Vec::new();
            for i in 0..n {
                let blk: FreeBlock = self.read_struct(start + dasd::FREEBLK_SIZE * (i+1),endian,"read free space")?;
                blocks.push((blk.pos as u64,blk.len as u64));
            }
            return Ok(FreeList::Array(start,blocks));
        }
        let mut blocks = Vec::new();
        let mut pos = start;
        while pos!=0 {
            if pos + dasd::FREEBLK_SIZE > self.file_len || blocks.len() as u64 > hdr.free_number as u64 {
                return Err(Error::Structure(format!("free space chain broken at {:#x}",pos)));
            }
            let blk: FreeBlock = self.read_struct(pos,endian,"read free space")?;
            blocks.push((pos,blk.len as u64));
            pos = blk.pos as u64;
        }
        Ok(FreeList::Chain(blocks))
    }
    /// Level 2 entry for a track, None if the level 1 entry is a sentinel
    pub fn l2_entry(&mut self,trk: u32) -> Result<Option<(u64,L2Entry)>,Error> {
        if trk >= self.geo.tracks {
            return Err(Error::TrackRange(trk));
        }
        let l1x = trk as u64 / dasd::L2_ENTRIES as u64;
        let l2x = trk as u64 % dasd::L2_ENTRIES as u64;
        if l1x >= self.cdevhdr.numl1tab as u64 {
            return Err(Error::TrackRange(trk));
        }
        let l1_entry: u32 = self.read_struct(dasd::L1_POS + l1x * dasd::L1_ENTRY_SIZE,self.endian(),"read level 1 entry")?;
        if dasd::l1_is_null(l1_entry) {
            return Ok(None);
        }
        let pos = l1_entry as u64 + l2x * dasd::L2_ENTRY_SIZE;
        let entry: L2Entry = self.read_struct(pos,self.endian(),"read level 2 entry")?;
        Ok(Some((pos,entry)))
    }
    /// Stored bytes of a track, None if the track is null
    pub fn read_stored(&mut self,trk: u32) -> Result<Option<Vec<u8>>,Error> {
        match self.l2_entry(trk)? {
            Some((_,e)) if e.is_live() => {
                if (e.len as usize) < TRKHDR_SIZE || e.pos as u64 + e.len as u64 > self.file_len {
                    return Err(Error::Structure(format!("track {} entry is out of bounds",trk)));
                }
                Ok(Some(self.read_bytes(e.pos as u64,e.len as usize,"read track image")?))
            },
            _ => Ok(None)
        }
    }
    /// Expanded track image, null tracks are produced from the null format
    pub fn read_track(&mut self,trk: u32) -> Result<Vec<u8>,Error> {
        match self.read_stored(trk)? {
            Some(stored) => track::expand(self.geo.media,&stored,self.geo.max_image_len()),
            None => track::null_image(&self.geo,trk,self.cdevhdr.nullfmt)
        }
    }
    /// Append a track at the end of the file and point the index at it.
    /// Tracks can only be written once, rewriting would require free space management.
    pub fn append_track(&mut self,trk: u32,kind: Kind,image: &[u8]) -> Result<L2Entry,Error> {
        track::validate(&self.geo,trk,image).map_err(|e| Error::Structure(format!("track {}: {}",trk,e)))?;
        let stored = track::shrink(kind,image)?;
        if stored.len() > u16::MAX as usize {
            return Err(Error::Structure(format!("track {} needs {} bytes",trk,stored.len())));
        }
        let l1x = trk as u64 / dasd::L2_ENTRIES as u64;
        let l2x = trk as usize % dasd::L2_ENTRIES;
        let l1_pos = dasd::L1_POS + l1x * dasd::L1_ENTRY_SIZE;
        let mut l1_entry: u32 = self.read_struct(l1_pos,self.endian(),"read level 1 entry")?;
        let mut l2 = if dasd::l1_is_null(l1_entry) {
            let table = L2Table::null(self.geo.shadow,self.cdevhdr.nullfmt);
            l1_entry = self.alloc_at_end(dasd::L2_TABLE_SIZE)?;
            self.write_l2(l1_entry as u64,&table)?;
            self.write_struct(l1_pos,&l1_entry,self.endian(),"write level 1 entry")?;
            debug!("level 2 table {} placed at {:#x}",l1x,l1_entry);
            table
        } else {
            self.read_l2(l1_entry as u64)?
        };
        if l2.entries[l2x].is_live() {
            return Err(Error::Structure(format!("track {} is already stored",trk)));
        }
        let pos = self.alloc_at_end(stored.len() as u64)?;
        self.write_bytes(pos as u64,&stored,"write track image")?;
        let entry = L2Entry { pos, len: stored.len() as u16, size: stored.len() as u16 };
        l2.entries[l2x] = entry;
        self.write_l2(l1_entry as u64,&l2)?;
        self.write_cdevhdr()?;
        trace!("track {} stored at {:#x}, {} bytes",trk,pos,stored.len());
        Ok(entry)
    }
    /// Append zeros to the file.  The size is updated but nothing else, so the
    /// free space counters in the header go stale until the image is checked.
    pub fn append_gap(&mut self,len: u64) -> Result<u64,Error> {
        let pos = self.file_len;
        self.write_bytes(pos,&vec![0;len as usize],"write gap")?;
        self.cdevhdr.size = self.file_len as u32;
        self.write_cdevhdr()?;
        Ok(pos)
    }
    fn alloc_at_end(&mut self,len: u64) -> Result<u32,Error> {
        let pos = self.file_len;
        if pos + len > u32::MAX as u64 {
            return Err(Error::Structure("image would exceed 4G".to_string()));
        }
        self.cdevhdr.size = (pos + len) as u32;
        self.cdevhdr.used += len as u32;
        Ok(pos as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_3390(big: bool) -> CckdImage<Cursor<Vec<u8>>> {
        let dev = names::by_name("3390").unwrap();
        CckdImage::create(Cursor::new(Vec::new()),dev,2,false,big,0).unwrap()
    }

    #[test]
    fn create_and_reopen() {
        for big in [false,true] {
            let mut img = new_3390(big);
            let data = vec![0x5a;1000];
            let trk = track::build_ckd(&img.geo,17,&[(b"".as_slice(),data.as_slice())]).unwrap();
            img.append_track(17,Kind::Zlib,&trk).unwrap();
            let mut img = CckdImage::open(img.into_inner()).unwrap();
            assert_eq!(img.geo.tracks,30);
            assert_eq!(img.cdevhdr.numl1tab,1);
            assert_eq!(img.cdevhdr.size as u64,img.file_len());
            assert_eq!(img.read_track(17).unwrap(),trk);
            assert_eq!(img.read_track(16).unwrap(),track::null_image(&img.geo,16,0).unwrap());
            assert!(img.read_track(30).is_err());
        }
    }

    #[test]
    fn bad_devid() {
        let mut img = new_3390(false);
        img.devhdr.devid = *b"CKD_X370";
        img.write_devhdr().unwrap();
        assert!(matches!(CckdImage::open(img.into_inner()),Err(Error::UnknownDevice)));
    }

    #[test]
    fn track_written_once() {
        let mut img = new_3390(false);
        let trk = track::build_ckd(&img.geo,0,&[]).unwrap();
        img.append_track(0,Kind::None,&trk).unwrap();
        assert!(img.append_track(0,Kind::None,&trk).is_err());
    }
}
