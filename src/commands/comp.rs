use crate::compact::{self,CompactOutcome};
use crate::STDRESULT;
use super::existing_image;

pub fn comp(cmd: &clap::ArgMatches) -> STDRESULT {
    let path = existing_image(cmd)?;
    let mut img = crate::open_image_file(path,true)?;
    match compact::compact(&mut img)? {
        CompactOutcome::NothingToDo => println!("{}: already compact",path),
        CompactOutcome::Compacted { old_size, new_size, moved, dropped } => {
            println!("{}: {} -> {} bytes, {} images moved, {} tables released",path,old_size,new_size,moved,dropped);
        }
    }
    Ok(())
}
