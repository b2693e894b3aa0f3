//! # Track Images
//!
//! Every stored image begins with a 5 byte header, big-endian regardless of the
//! image byte order:
//!
//! * CKD: compression tag, cylinder (2 bytes), head (2 bytes)
//! * FBA: compression tag, block group number (4 bytes)
//!
//! When expanded, a CKD track is the header (tag 0) followed by record zero
//! (count `CCHH 00 00 0008` plus 8 data bytes), then any number of records
//! (count `CCHH R KL DLDL`, key, data), then the end of track marker of eight `0xff`.
//! An expanded FBA block group is the header followed by 120 sectors of 512 bytes.

use super::{Geometry,Media};
use super::codec::{self,Kind};
use super::Error;

pub const TRKHDR_SIZE: usize = 5;
pub const COUNT_SIZE: usize = 8;
/// record zero count plus its 8 data bytes
pub const R0_SIZE: usize = 16;
pub const EOT: [u8;8] = [0xff;8];
pub const FBA_SECTOR_SIZE: usize = 512;
pub const FBA_BLOCK_NUM: u32 = 120;
pub const FBA_BLOCK_SIZE: usize = FBA_BLOCK_NUM as usize * FBA_SECTOR_SIZE;
/// data length of the records in a format 2 null track
const NULL2_DATA: usize = 4096;
const NULL2_RECORDS: u8 = 12;

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum TrackAddr {
    /// cylinder and head
    CH(u16,u16),
    /// FBA block group
    Group(u32)
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub struct TrackHeader {
    pub tag: u8,
    pub addr: TrackAddr
}

impl TrackHeader {
    pub fn parse(media: Media,buf: &[u8]) -> Option<Self> {
        if buf.len() < TRKHDR_SIZE {
            return None;
        }
        let addr = match media {
            Media::Ckd => TrackAddr::CH(u16::from_be_bytes([buf[1],buf[2]]),u16::from_be_bytes([buf[3],buf[4]])),
            Media::Fba => TrackAddr::Group(u32::from_be_bytes([buf[1],buf[2],buf[3],buf[4]]))
        };
        Some(Self { tag: buf[0], addr })
    }
    pub fn to_bytes(&self) -> [u8;TRKHDR_SIZE] {
        let mut ans = [self.tag,0,0,0,0];
        match self.addr {
            TrackAddr::CH(c,h) => {
                ans[1..3].copy_from_slice(&c.to_be_bytes());
                ans[3..5].copy_from_slice(&h.to_be_bytes());
            },
            TrackAddr::Group(g) => ans[1..5].copy_from_slice(&g.to_be_bytes())
        }
        ans
    }
}

/// Why an expanded image fails the structural contract
#[derive(thiserror::Error,Debug,PartialEq,Eq)]
pub enum Fault {
    #[error("image too short")]
    Short,
    #[error("header address does not match the track")]
    Address,
    #[error("record zero is malformed")]
    RecordZero,
    #[error("records run past the end of the image")]
    Overrun,
    #[error("data follows the end of track marker")]
    Trailing,
    #[error("block group has wrong length {0}")]
    GroupLength(usize)
}

/// Walk the records of an expanded CKD image and return its length through the
/// end of track marker.  Record zero must carry the address of the home address,
/// and the walk never goes beyond `max` bytes.
pub fn ckd_image_len(buf: &[u8],max: usize) -> Result<usize,Fault> {
    let lim = usize::min(buf.len(),max);
    if lim < TRKHDR_SIZE + R0_SIZE + COUNT_SIZE {
        return Err(Fault::Short);
    }
    if buf[5..9]!=buf[1..5] || buf[9]!=0 || buf[10]!=0 || buf[11..13]!=[0,8] {
        return Err(Fault::RecordZero);
    }
    let mut ptr = TRKHDR_SIZE + R0_SIZE;
    loop {
        if ptr + COUNT_SIZE > lim {
            return Err(Fault::Overrun);
        }
        if buf[ptr..ptr+COUNT_SIZE]==EOT {
            return Ok(ptr + COUNT_SIZE);
        }
        let kl = buf[ptr+5] as usize;
        let dl = u16::from_be_bytes([buf[ptr+6],buf[ptr+7]]) as usize;
        ptr += COUNT_SIZE + kl + dl;
    }
}

/// Check an expanded image (tag 0 header plus payload) against the track it is supposed to be.
pub fn validate(geo: &Geometry,trk: u32,image: &[u8]) -> Result<(),Fault> {
    let hdr = TrackHeader::parse(geo.media,image).ok_or(Fault::Short)?;
    if geo.track_of(hdr.addr)!=Some(trk) {
        return Err(Fault::Address);
    }
    match geo.media {
        Media::Ckd => {
            let len = ckd_image_len(image,geo.max_image_len())?;
            match len==image.len() {
                true => Ok(()),
                false => Err(Fault::Trailing)
            }
        },
        Media::Fba => match image.len()==TRKHDR_SIZE + FBA_BLOCK_SIZE {
            true => Ok(()),
            false => Err(Fault::GroupLength(image.len()))
        }
    }
}

/// Expand a stored image into the header (with tag 0) followed by the decoded payload.
pub fn expand(media: Media,stored: &[u8],max: usize) -> Result<Vec<u8>,Error> {
    let hdr = TrackHeader::parse(media,stored).ok_or(Error::BadTrackImage)?;
    let kind = Kind::from_tag(hdr.tag).ok_or(Error::UnsupportedCompression(hdr.tag))?;
    let payload = codec::decode(kind,&stored[TRKHDR_SIZE..],max.saturating_sub(TRKHDR_SIZE))?;
    let mut ans = TrackHeader { tag: 0, addr: hdr.addr }.to_bytes().to_vec();
    ans.extend_from_slice(&payload);
    Ok(ans)
}

/// Compress an expanded image, producing what is stored in the file.
/// If compression does not pay, the image is stored as is.
pub fn shrink(kind: Kind,image: &[u8]) -> Result<Vec<u8>,Error> {
    if image.len() < TRKHDR_SIZE {
        return Err(Error::BadTrackImage);
    }
    if kind==Kind::None {
        return Ok(image.to_vec());
    }
    let payload = codec::encode(kind,&image[TRKHDR_SIZE..])?;
    if payload.len() + TRKHDR_SIZE >= image.len() {
        return Ok(image.to_vec());
    }
    let mut ans = image[0..TRKHDR_SIZE].to_vec();
    ans[0] = kind as u8;
    ans.extend_from_slice(&payload);
    Ok(ans)
}

fn count_field(c: u16,h: u16,r: u8,kl: u8,dl: u16) -> [u8;COUNT_SIZE] {
    let mut ans = [0;COUNT_SIZE];
    ans[0..2].copy_from_slice(&c.to_be_bytes());
    ans[2..4].copy_from_slice(&h.to_be_bytes());
    ans[4] = r;
    ans[5] = kl;
    ans[6..8].copy_from_slice(&dl.to_be_bytes());
    ans
}

/// Build an expanded CKD track from (key,data) pairs, records are numbered from 1.
pub fn build_ckd(geo: &Geometry,trk: u32,records: &[(&[u8],&[u8])]) -> Result<Vec<u8>,Error> {
    let (c,h) = match geo.track_addr(trk) {
        TrackAddr::CH(c,h) if trk < geo.tracks => (c,h),
        _ => return Err(Error::TrackRange(trk))
    };
    let mut ans = TrackHeader { tag: 0, addr: TrackAddr::CH(c,h) }.to_bytes().to_vec();
    ans.extend_from_slice(&count_field(c,h,0,0,8));
    ans.extend_from_slice(&[0;8]);
    for (i,(key,data)) in records.iter().enumerate() {
        if key.len() > u8::MAX as usize || data.len() > u16::MAX as usize || i >= u8::MAX as usize {
            return Err(Error::Structure(format!("record {} does not fit a count field",i+1)));
        }
        ans.extend_from_slice(&count_field(c,h,i as u8 + 1,key.len() as u8,data.len() as u16));
        ans.extend_from_slice(key);
        ans.extend_from_slice(data);
    }
    ans.extend_from_slice(&EOT);
    if ans.len() > geo.max_image_len() {
        return Err(Error::Structure(format!("track {} would need {} bytes",trk,ans.len())));
    }
    Ok(ans)
}

/// Build an expanded FBA block group, `data` is zero filled to the group size.
pub fn build_fba(geo: &Geometry,group: u32,data: &[u8]) -> Result<Vec<u8>,Error> {
    if group >= geo.tracks {
        return Err(Error::TrackRange(group));
    }
    if data.len() > FBA_BLOCK_SIZE {
        return Err(Error::Structure(format!("block group data of {} bytes",data.len())));
    }
    let mut ans = TrackHeader { tag: 0, addr: TrackAddr::Group(group) }.to_bytes().to_vec();
    ans.extend_from_slice(data);
    ans.resize(TRKHDR_SIZE + FBA_BLOCK_SIZE,0);
    Ok(ans)
}

/// The image a null entry stands for
pub fn null_image(geo: &Geometry,trk: u32,nullfmt: u8) -> Result<Vec<u8>,Error> {
    match geo.media {
        Media::Fba => build_fba(geo,trk,&[]),
        Media::Ckd => match nullfmt {
            1 => build_ckd(geo,trk,&[]),
            2 => {
                let data = [0u8;NULL2_DATA];
                let recs: Vec<(&[u8],&[u8])> = (0..NULL2_RECORDS).map(|_| (&[] as &[u8],&data as &[u8])).collect();
                build_ckd(geo,trk,&recs)
            },
            // format 0 carries an empty record 1, i.e. an end of file marker
            _ => build_ckd(geo,trk,&[(&[],&[])])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dasd::{DeviceId,DevHeader,CompressedHeader};

    fn geo3390() -> Geometry {
        let devhdr = DevHeader::new(DeviceId::CkdBase,15,56832,0x90);
        let cdevhdr = CompressedHeader::new(1,1,0,false);
        Geometry::new(DeviceId::CkdBase,&devhdr,&cdevhdr)
    }

    #[test]
    fn null_formats() {
        let geo = geo3390();
        assert_eq!(null_image(&geo,3,0).unwrap().len(),37);
        assert_eq!(null_image(&geo,3,1).unwrap().len(),29);
        let fmt2 = null_image(&geo,3,2).unwrap();
        assert_eq!(fmt2.len(),29 + 12 * (8 + 4096));
        for fmt in 0..3 {
            assert_eq!(validate(&geo,3,&null_image(&geo,3,fmt).unwrap()),Ok(()));
        }
    }

    #[test]
    fn record_walk() {
        let geo = geo3390();
        let trk = build_ckd(&geo,14,&[(b"KEY".as_slice(),b"some data".as_slice()),(&[][..],&[7u8;300][..])]).unwrap();
        assert_eq!(ckd_image_len(&trk,geo.max_image_len()),Ok(trk.len()));
        assert_eq!(validate(&geo,14,&trk),Ok(()));
        assert_eq!(validate(&geo,13,&trk),Err(Fault::Address));
        let mut longer = trk.clone();
        longer.push(0);
        assert_eq!(validate(&geo,14,&longer),Err(Fault::Trailing));
        assert_eq!(ckd_image_len(&trk[0..trk.len()-1],geo.max_image_len()),Err(Fault::Overrun));
        let mut bad_r0 = trk.clone();
        bad_r0[12] = 9;
        assert_eq!(ckd_image_len(&bad_r0,geo.max_image_len()),Err(Fault::RecordZero));
    }

    #[test]
    fn header_bytes() {
        let hdr = TrackHeader { tag: 1, addr: TrackAddr::CH(0x102,7) };
        assert_eq!(hdr.to_bytes(),[1,1,2,0,7]);
        assert_eq!(TrackHeader::parse(Media::Ckd,&hdr.to_bytes()),Some(hdr));
        let grp = TrackHeader::parse(Media::Fba,&[0,0,0,1,2]).unwrap();
        assert_eq!(grp.addr,TrackAddr::Group(258));
    }
}
