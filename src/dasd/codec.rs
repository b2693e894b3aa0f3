//! Compression codecs for track images
//!
//! The tag in the first byte of a stored image selects the codec for the bytes that follow
//! the 5 byte header.  Codecs are compiled in by cargo features, a tag that is known but
//! compiled out is *unsupported*, which is different from a corrupt tag.

use std::fmt;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use super::Error;

#[derive(Debug,Copy,Clone,PartialEq,Eq,FromPrimitive)]
pub enum Kind {
    None = 0,
    Zlib = 1,
    Bzip2 = 2
}

impl Kind {
    /// None if the tag is not a known codec, which is corruption
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::from_u8(tag)
    }
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Self::None),
            "zlib" => Some(Self::Zlib),
            "bzip2" => Some(Self::Bzip2),
            _ => None
        }
    }
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Zlib => "zlib",
            Self::Bzip2 => "bzip2"
        }
    }
    pub fn supported(&self) -> bool {
        match self {
            Self::None => true,
            Self::Zlib => cfg!(feature = "zlib"),
            Self::Bzip2 => cfg!(feature = "bzip2")
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{}",self.name())
    }
}

/// Decode the stream at the start of `src`, which may be followed by unrelated bytes.
/// Returns the number of bytes the stream occupies and the decoded bytes.
/// Fails if the stream is corrupt, truncated, or decodes to more than `max_out` bytes.
pub fn decode_prefix(kind: Kind,src: &[u8],max_out: usize) -> Result<(usize,Vec<u8>),Error> {
    match kind {
        Kind::None => {
            let n = usize::min(src.len(),max_out);
            Ok((n,src[0..n].to_vec()))
        },
        #[cfg(feature = "zlib")]
        Kind::Zlib => zlib_prefix(src,max_out),
        #[cfg(feature = "bzip2")]
        Kind::Bzip2 => bzip2_prefix(src,max_out),
        #[allow(unreachable_patterns)]
        k => Err(Error::UnsupportedCompression(k as u8))
    }
}

/// Decode a stored payload whose extent is already known
pub fn decode(kind: Kind,src: &[u8],max_out: usize) -> Result<Vec<u8>,Error> {
    match kind {
        Kind::None if src.len() > max_out => Err(Error::BadTrackImage),
        Kind::None => Ok(src.to_vec()),
        _ => Ok(decode_prefix(kind,src,max_out)?.1)
    }
}

pub fn encode(kind: Kind,src: &[u8]) -> Result<Vec<u8>,Error> {
    match kind {
        Kind::None => Ok(src.to_vec()),
        #[cfg(feature = "zlib")]
        Kind::Zlib => {
            use std::io::Write;
            let mut enc = flate2::write::ZlibEncoder::new(Vec::new(),flate2::Compression::default());
            enc.write_all(src).map_err(Error::io("zlib compress",0))?;
            enc.finish().map_err(Error::io("zlib compress",0))
        },
        #[cfg(feature = "bzip2")]
        Kind::Bzip2 => {
            use std::io::Write;
            let mut enc = bzip2::write::BzEncoder::new(Vec::new(),bzip2::Compression::default());
            enc.write_all(src).map_err(Error::io("bzip2 compress",0))?;
            enc.finish().map_err(Error::io("bzip2 compress",0))
        },
        #[allow(unreachable_patterns)]
        k => Err(Error::UnsupportedCompression(k as u8))
    }
}

#[cfg(feature = "zlib")]
fn zlib_prefix(src: &[u8],max_out: usize) -> Result<(usize,Vec<u8>),Error> {
    let mut inflater = flate2::Decompress::new(true);
    let mut out: Vec<u8> = Vec::with_capacity(max_out);
    loop {
        let in_offset = inflater.total_in() as usize;
        let out_before = inflater.total_out();
        let status = inflater.decompress_vec(&src[in_offset..],&mut out,flate2::FlushDecompress::Finish)
            .map_err(|_| Error::BadTrackImage)?;
        match status {
            flate2::Status::StreamEnd if out.len() <= max_out => return Ok((inflater.total_in() as usize,out)),
            flate2::Status::StreamEnd => return Err(Error::BadTrackImage),
            _ => {
                let stalled = inflater.total_out()==out_before && inflater.total_in() as usize==in_offset;
                if out.len() > max_out || stalled {
                    return Err(Error::BadTrackImage);
                }
            }
        }
    }
}

#[cfg(feature = "bzip2")]
fn bzip2_prefix(src: &[u8],max_out: usize) -> Result<(usize,Vec<u8>),Error> {
    let mut expander = bzip2::Decompress::new(false);
    let mut out: Vec<u8> = Vec::with_capacity(max_out);
    loop {
        let in_offset = expander.total_in() as usize;
        let out_before = expander.total_out();
        let status = expander.decompress_vec(&src[in_offset..],&mut out)
            .map_err(|_| Error::BadTrackImage)?;
        match status {
            bzip2::Status::StreamEnd if out.len() <= max_out => return Ok((expander.total_in() as usize,out)),
            bzip2::Status::StreamEnd => return Err(Error::BadTrackImage),
            _ => {
                let stalled = expander.total_out()==out_before && expander.total_in() as usize==in_offset;
                if out.len() > max_out || stalled {
                    return Err(Error::BadTrackImage);
                }
            }
        }
    }
}
