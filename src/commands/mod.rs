//! # CLI Subcommands
//!
//! Contains modules that run the subcommands.
//! Every subcommand works on one image file given by `--dimg`.

pub mod chk;
pub mod comp;
pub mod swap;
pub mod stat;
pub mod get;
pub mod mkdsk;
pub mod completions;

#[derive(thiserror::Error,Debug)]
pub enum CommandError {
    #[error("Command could not be interpreted")]
    InvalidCommand,
    #[error("One of the parameters was out of range")]
    OutOfRange,
    #[error("Compression is not available in this build")]
    UnsupportedFormat,
    #[error("File not found")]
    FileNotFound
}

/// Get a required string argument
fn required<'a>(cmd: &'a clap::ArgMatches,id: &str) -> Result<&'a String,CommandError> {
    cmd.get_one::<String>(id).ok_or(CommandError::InvalidCommand)
}

/// Path of the image, which must exist
fn existing_image(cmd: &clap::ArgMatches) -> Result<&String,CommandError> {
    let path = required(cmd,"dimg")?;
    match std::path::Path::new(path).is_file() {
        true => Ok(path),
        false => {
            log::error!("image {} not found",path);
            Err(CommandError::FileNotFound)
        }
    }
}
