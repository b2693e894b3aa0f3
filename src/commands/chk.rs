use log::error;
use crate::chkdsk::{self,CheckOptions,CheckReport};
use crate::DYNERR;
use super::existing_image;

/// Check and repair an image, returns the exit status.
/// Anything that stops the check is status -1, which the shell sees as 255.
pub fn chk(cmd: &clap::ArgMatches) -> Result<i32,DYNERR> {
    let path = existing_image(cmd)?;
    let opts = CheckOptions {
        level: *cmd.get_one::<i32>("level").unwrap_or(&0),
        read_only: cmd.get_flag("ro")
    };
    let mut img = match crate::open_image_file(path,!opts.read_only) {
        Ok(img) => img,
        Err(e) => {
            error!("could not open {}: {}",path,e);
            return Ok(-1);
        }
    };
    let result = chkdsk::chkdsk(&mut img,opts);
    let status = chkdsk::status_of(&result);
    match result {
        Ok(report) if cmd.get_flag("json") => {
            println!("{}",report.to_json(cmd.get_one::<u16>("indent").copied()));
        },
        Ok(report) => print_report(path,&report),
        Err(e) => eprintln!("{}: {}",path,e)
    }
    Ok(status)
}

fn print_report(path: &str,report: &CheckReport) {
    for d in &report.diagnostics {
        println!("{}",d);
    }
    if !report.recovered.is_empty() {
        println!("recovered tracks: {:?}",report.recovered);
    }
    if !report.lost.is_empty() {
        println!("lost tracks: {:?}",report.lost);
    }
    if report.read_only_equivalent {
        println!("repairs withheld, {} tracks use unavailable compression",report.unsupported.len());
    }
    println!("{}: status {}, level {}, free {} bytes in {} gaps",path,report.status(),report.level,
        report.free.total,report.free.number);
}
