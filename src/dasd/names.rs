//! Device type table
//!
//! Maps the device type byte of the device header to the geometry of the device.
//! CKD and FBA devices are kept in separate tables since the same byte value can mean
//! different things depending on the media.

use super::{Media,Error};
use super::track::{TRKHDR_SIZE,R0_SIZE,COUNT_SIZE};

#[derive(Debug,PartialEq,Eq)]
pub struct DeviceType {
    pub name: &'static str,
    pub media: Media,
    pub code: u8,
    /// tracks per cylinder, 0 for FBA
    pub heads: u32,
    /// cylinders of the base model, or sectors for FBA
    pub cyls: u32,
    /// usable bytes per track, or bytes per sector for FBA
    pub trklen: u32
}

impl DeviceType {
    /// Buffer length of a full track image, headers and end of track marker included,
    /// rounded up to a sector.  For FBA this is the sector size.
    pub fn trksize(&self) -> u32 {
        match self.media {
            Media::Ckd => {
                let raw = (TRKHDR_SIZE + R0_SIZE + COUNT_SIZE) as u32 + self.trklen;
                raw.div_ceil(512) * 512
            },
            Media::Fba => self.trklen
        }
    }
}

const fn ckd(name: &'static str,code: u8,heads: u32,cyls: u32,trklen: u32) -> DeviceType {
    DeviceType { name, media: Media::Ckd, code, heads, cyls, trklen }
}

const fn fba(name: &'static str,code: u8,sectors: u32) -> DeviceType {
    DeviceType { name, media: Media::Fba, code, heads: 0, cyls: sectors, trklen: 512 }
}

pub const CKD_TYPES: [DeviceType;9] = [
    ckd("2311",0x11,10,200,3625),
    ckd("2314",0x14,20,200,7294),
    ckd("3330",0x30,19,404,13165),
    ckd("3340",0x40,12,348,8535),
    ckd("3350",0x50,30,555,19254),
    ckd("3375",0x75,12,959,36000),
    ckd("3380",0x80,15,885,47968),
    ckd("3390",0x90,15,1113,56664),
    ckd("9345",0x45,15,1440,46456)
];

pub const FBA_TYPES: [DeviceType;5] = [
    fba("3310",0x10,126016),
    fba("3370",0x70,558000),
    fba("9332",0x32,360036),
    fba("9336",0x36,920115),
    fba("0671",0x71,574560)
];

/// Find the device type for a media and type byte, failure is fatal to any tool.
pub fn lookup(media: Media,code: u8) -> Result<&'static DeviceType,Error> {
    let table: &'static [DeviceType] = match media {
        Media::Ckd => &CKD_TYPES,
        Media::Fba => &FBA_TYPES
    };
    table.iter().find(|d| d.code==code).ok_or(Error::UnknownDeviceType(code))
}

/// Find the device type by its model name, e.g. `3390`
pub fn by_name(name: &str) -> Result<&'static DeviceType,Error> {
    CKD_TYPES.iter().chain(FBA_TYPES.iter())
        .find(|d| d.name==name)
        .ok_or(Error::UnknownDeviceName(name.to_string()))
}

pub fn all_names() -> Vec<&'static str> {
    CKD_TYPES.iter().chain(FBA_TYPES.iter()).map(|d| d.name).collect()
}

#[test]
fn lookup_by_media() {
    assert_eq!(lookup(Media::Ckd,0x90).unwrap().name,"3390");
    assert_eq!(lookup(Media::Fba,0x70).unwrap().name,"3370");
    assert!(lookup(Media::Fba,0x90).is_err());
    assert_eq!(by_name("3380").unwrap().heads,15);
    assert_eq!(lookup(Media::Ckd,0x90).unwrap().trksize(),56832);
}
