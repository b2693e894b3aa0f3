//! # Command Line Interface
//!
//! The command tree is in `cli.rs`, which is also included by the build script.
//! The subcommands are in the `commands` module.

mod cli;

use log::error;
use cckdkit::commands;
use cckdkit::commands::CommandError;

fn main() -> Result<(),Box<dyn std::error::Error>>
{
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let matches = cli::build_cli().get_matches();

    // Check and repair, the exit code is the check status

    if let Some(cmd) = matches.subcommand_matches("chk") {
        let status = match commands::chk::chk(cmd) {
            Ok(status) => status,
            Err(e) => {
                eprintln!("{}",e);
                -1
            }
        };
        std::process::exit(status);
    }

    if let Some(cmd) = matches.subcommand_matches("comp") {
        return commands::comp::comp(cmd);
    }
    if let Some(cmd) = matches.subcommand_matches("swap") {
        return commands::swap::swap(cmd);
    }
    if let Some(cmd) = matches.subcommand_matches("stat") {
        return commands::stat::stat(cmd);
    }
    if let Some(cmd) = matches.subcommand_matches("get") {
        return commands::get::get(cmd);
    }
    if let Some(cmd) = matches.subcommand_matches("mkdsk") {
        return commands::mkdsk::mkdsk(cmd);
    }
    if let Some(cmd) = matches.subcommand_matches("completions") {
        return commands::completions::generate(cli::build_cli(),cmd);
    }

    error!("No subcommand was found, try `cckdkit --help`");
    Err(Box::new(CommandError::InvalidCommand))
}
