use clap_complete::shells;
use crate::STDRESULT;
use super::{required,CommandError};

pub fn generate(mut main_cmd: clap::Command,cmd: &clap::ArgMatches) -> STDRESULT {
    let out = &mut std::io::stdout();
    match required(cmd,"shell")?.as_str() {
        "bash" => clap_complete::generate(shells::Bash,&mut main_cmd,"cckdkit",out),
        "elvish" => clap_complete::generate(shells::Elvish,&mut main_cmd,"cckdkit",out),
        "fish" => clap_complete::generate(shells::Fish,&mut main_cmd,"cckdkit",out),
        "powershell" => clap_complete::generate(shells::PowerShell,&mut main_cmd,"cckdkit",out),
        "zsh" => clap_complete::generate(shells::Zsh,&mut main_cmd,"cckdkit",out),
        _ => return Err(Box::new(CommandError::InvalidCommand))
    }
    Ok(())
}
