use crate::endian;
use crate::STDRESULT;
use super::existing_image;

pub fn swap(cmd: &clap::ArgMatches) -> STDRESULT {
    let path = existing_image(cmd)?;
    let mut img = crate::open_image_file(path,true)?;
    if cmd.get_flag("host") {
        if !endian::normalize(&mut img)? {
            println!("{}: already in host byte order",path);
            return Ok(());
        }
    } else {
        endian::swap(&mut img)?;
    }
    img.flush()?;
    println!("{}: now {:?} endian",path,img.endian());
    Ok(())
}
