use std::io::Write;
use log::info;
use crate::STDRESULT;
use super::{existing_image,CommandError};

/// Write an expanded track to stdout, as a hex dump unless `--raw`
pub fn get(cmd: &clap::ArgMatches) -> STDRESULT {
    let path = existing_image(cmd)?;
    let trk = *cmd.get_one::<u32>("track").ok_or(CommandError::InvalidCommand)?;
    let mut img = crate::open_image_file(path,false)?;
    if trk >= img.geo.tracks {
        log::error!("track {} is beyond the last track {}",trk,img.geo.tracks.saturating_sub(1));
        return Err(Box::new(CommandError::OutOfRange));
    }
    let image = img.read_track(trk)?;
    info!("track {} expands to {} bytes",trk,image.len());
    if cmd.get_flag("raw") {
        std::io::stdout().write_all(&image)?;
    } else {
        crate::display_block(0,&image);
    }
    Ok(())
}
