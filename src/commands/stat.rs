//! Image statistics as JSON.
//! Header fields with a raw form carry both `_raw` (hex string) and `_pretty` keys.

use json::JsonValue;
use crate::dasd::{self,Media};
use crate::image::{CckdImage,Storage};
use crate::space::SpaceTable;
use crate::{STDRESULT,DYNERR};
use super::existing_image;

pub fn stat(cmd: &clap::ArgMatches) -> STDRESULT {
    let path = existing_image(cmd)?;
    let mut img = crate::open_image_file(path,false)?;
    println!("{}",image_json(&mut img,cmd.get_one::<u16>("indent").copied())?);
    Ok(())
}

fn raw_pretty(raw: &[u8],pretty: JsonValue) -> JsonValue {
    let mut ans = JsonValue::new_object();
    ans["_raw"] = JsonValue::String(hex::encode_upper(raw));
    ans["_pretty"] = pretty;
    ans
}

/// Build the statistics of an open image.  Nothing is written.
pub fn image_json<S: Storage>(img: &mut CckdImage<S>,indent: Option<u16>) -> Result<String,DYNERR> {
    let mut root = JsonValue::new_object();
    let hdr = img.cdevhdr.clone();
    root["device"] = JsonValue::new_object();
    root["device"]["devid"] = raw_pretty(&img.devhdr.devid,JsonValue::String(img.id.to_string()));
    root["device"]["type"] = raw_pretty(&[img.devhdr.devtype],JsonValue::String(img.devtype.name.to_string()));
    root["device"]["media"] = JsonValue::String(match img.geo.media {
        Media::Ckd => "ckd".to_string(),
        Media::Fba => "fba".to_string()
    });
    root["device"]["shadow"] = img.geo.shadow.into();
    root["device"]["heads"] = img.geo.heads.into();
    root["device"]["cylinders"] = img.geo.cyls.into();
    root["device"]["tracks"] = img.geo.tracks.into();
    root["device"]["track_size"] = img.geo.trksize.into();

    root["header"] = JsonValue::new_object();
    root["header"]["version"] = raw_pretty(&hdr.vrm,JsonValue::String(format!("{}.{}.{}",hdr.vrm[0],hdr.vrm[1],hdr.vrm[2])));
    let mut flags = JsonValue::new_array();
    for (bit,name) in [
        (dasd::OPT_NOFUDGE,"nofudge"),
        (dasd::OPT_BIGENDIAN,"bigendian"),
        (dasd::OPT_SPERRS,"space-errors"),
        (dasd::OPT_ORDWR,"opened-rw"),
        (dasd::OPT_OPENED,"opened")
    ] {
        if hdr.options & bit > 0 {
            flags.push(name)?;
        }
    }
    root["header"]["options"] = raw_pretty(&[hdr.options],flags);
    root["header"]["l1_entries"] = hdr.numl1tab.into();
    root["header"]["l2_entries"] = hdr.numl2tab.into();
    root["header"]["size"] = hdr.size.into();
    root["header"]["used"] = hdr.used.into();
    root["header"]["free"] = hdr.free.into();
    root["header"]["free_total"] = hdr.free_total.into();
    root["header"]["free_largest"] = hdr.free_largest.into();
    root["header"]["free_number"] = hdr.free_number.into();
    root["header"]["free_imbed"] = hdr.free_imbed.into();
    root["header"]["null_format"] = hdr.nullfmt.into();

    root["file"] = JsonValue::new_object();
    root["file"]["size"] = img.file_len().into();
    let l1 = img.read_l1()?;
    let tables = img.read_l2_tables(&l1).and_then(|l2s| {
        let space = SpaceTable::build(hdr.numl1tab,img.file_len(),&l1,&l2s,img.geo.max_image_len())?;
        Ok((l2s,space))
    });
    match tables {
        Ok((l2s,space)) => {
            let stored: usize = l2s.iter().flatten().map(|t| t.live_count()).sum();
            let stats = space.free_stats();
            root["file"]["l2_tables"] = l2s.iter().flatten().count().into();
            root["file"]["stored_tracks"] = stored.into();
            root["file"]["null_tracks"] = (img.geo.tracks as usize).saturating_sub(stored).into();
            root["file"]["free_total"] = stats.total.into();
            root["file"]["free_largest"] = stats.largest.into();
            root["file"]["free_number"] = stats.number.into();
            root["file"]["free_imbed"] = stats.imbed.into();
            root["file"]["overlaps"] = space.overlaps().len().into();
        },
        Err(e) => {
            log::warn!("space could not be mapped: {}",e);
            root["file"]["error"] = JsonValue::String(e.to_string());
        }
    }
    Ok(match indent {
        Some(spaces) => json::stringify_pretty(root,spaces),
        None => json::stringify(root)
    })
}
