use log::{info,error};
use crate::dasd::{self,names};
use crate::dasd::codec::Kind;
use crate::dasd::track;
use crate::image::{CckdImage,Storage};
use crate::STDRESULT;
use super::{required,CommandError};

pub fn mkdsk(cmd: &clap::ArgMatches) -> STDRESULT {
    let path = required(cmd,"dimg")?;
    let devtype = names::by_name(required(cmd,"kind")?)?;
    let cyls = cmd.get_one::<u32>("cyls").copied().unwrap_or(devtype.cyls);
    let nullfmt = *cmd.get_one::<u8>("nullfmt").unwrap_or(&0);
    let format = match cmd.get_one::<String>("format") {
        Some(name) => match Kind::from_name(name) {
            Some(k) if k.supported() => Some(k),
            _ => {
                error!("{} compression is not available",name);
                return Err(Box::new(CommandError::UnsupportedFormat));
            }
        },
        None => None
    };
    if std::path::Path::new(path).exists() {
        error!("{} already exists, delete it first",path);
        return Err(Box::new(CommandError::InvalidCommand));
    }
    let mut img = crate::create_image_file(path,devtype,cyls,cmd.get_flag("shadow"),cmd.get_flag("big"),nullfmt)?;
    if let Some(kind) = format {
        let count = format_all(&mut img,kind)?;
        info!("{} tracks written",count);
    }
    img.flush()?;
    Ok(())
}

/// Store the null image of every track explicitly, compressed with `kind`
pub fn format_all<S: Storage>(img: &mut CckdImage<S>,kind: Kind) -> Result<u32,dasd::Error> {
    let nullfmt = img.cdevhdr.nullfmt;
    for trk in 0..img.geo.tracks {
        let image = track::null_image(&img.geo,trk,nullfmt)?;
        img.append_track(trk,kind,&image)?;
    }
    Ok(img.geo.tracks)
}
