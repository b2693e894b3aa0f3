use clap::{value_parser, crate_version, Arg, ArgAction, Command, ValueHint};

const LEVEL_HELP: &str = "-1 checks headers and index regions only,
0 checks every index entry and the free space counters,
1 also checks the free space list,
2 also checks every track header,
3 also decodes every track and checks its records,
4 discards the level 2 tables and recovers every track from the file";
const STATUS_HELP: &str = "The exit code is the check status:
0 image is clean, 1 free space was rebuilt, 2 tracks were recovered or indices rebuilt,
255 the image could not be repaired.";

fn dimg_arg() -> Arg {
    Arg::new("dimg").short('d').long("dimg").help("path to compressed disk image")
        .value_name("PATH")
        .value_hint(ValueHint::FilePath)
        .required(true)
}

fn indent_arg() -> Arg {
    Arg::new("indent").long("indent").help("JSON indentation, omit to minify")
        .value_name("SPACES")
        .value_parser(value_parser!(u16).range(0..16))
        .required(false)
}

pub fn build_cli() -> Command {
    let long_help = "cckdkit is always invoked with exactly one of several subcommands.
The subcommands operate on compressed CKD or FBA disk images in place.
Set RUST_LOG environment variable to control logging level.
  levels: trace,debug,info,warn,error

Examples:
---------
create image:          `cckdkit mkdsk -k 3390 -c 10 -d disk.cckd`
check and repair:      `cckdkit chk -l 3 -d disk.cckd`
report only:           `cckdkit chk --ro -d disk.cckd`
remove free space:     `cckdkit comp -d disk.cckd`
dump a track:          `cckdkit get -t 15 -d disk.cckd`";

    let dev_types = [
        "2311", "2314", "3330", "3340", "3350", "3375", "3380", "3390", "9345",
        "3310", "3370", "9332", "9336", "0671",
    ];

    let mut main_cmd = Command::new("cckdkit")
        .about("Checks, repairs, and compacts compressed CKD/FBA disk images.")
        .after_long_help(long_help)
        .version(crate_version!());

    main_cmd = main_cmd.subcommand(
        Command::new("chk")
            .arg(dimg_arg())
            .arg(Arg::new("level").short('l').long("level").help("check level")
                .value_name("LEVEL")
                .value_parser(value_parser!(i32).range(-1..=4))
                .allow_negative_numbers(true)
                .default_value("0")
                .long_help(LEVEL_HELP))
            .arg(Arg::new("ro").long("ro").help("report only, never write").action(ArgAction::SetTrue))
            .arg(Arg::new("json").long("json").help("write the report as JSON").action(ArgAction::SetTrue))
            .arg(indent_arg())
            .about("check and repair a compressed image")
            .after_help(STATUS_HELP)
    );
    main_cmd = main_cmd.subcommand(
        Command::new("comp")
            .arg(dimg_arg())
            .about("remove all free space from a compressed image")
            .after_help("The image should pass `chk` first.")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("swap")
            .arg(dimg_arg())
            .arg(Arg::new("host").long("host").help("only swap if the image is not in host byte order").action(ArgAction::SetTrue))
            .about("rewrite the image indices in the opposite byte order")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("stat")
            .arg(dimg_arg())
            .arg(indent_arg())
            .about("write image headers and space usage to stdout as JSON")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("get")
            .arg(dimg_arg())
            .arg(Arg::new("track").short('t').long("track").help("track or block group number")
                .value_name("TRACK")
                .value_parser(value_parser!(u32))
                .required(true))
            .arg(Arg::new("raw").long("raw").help("write the expanded image bytes instead of a hex dump").action(ArgAction::SetTrue))
            .about("read a track from the image, write to stdout")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("mkdsk")
            .arg(Arg::new("dimg").short('d').long("dimg").help("path of image to create")
                .value_name("PATH")
                .value_hint(ValueHint::FilePath)
                .required(true))
            .arg(Arg::new("kind").short('k').long("kind").help("device type")
                .value_name("DEVTYPE")
                .value_parser(dev_types)
                .required(true))
            .arg(Arg::new("cyls").short('c').long("cyls").help("cylinders, or sectors for FBA")
                .value_name("COUNT")
                .value_parser(value_parser!(u32).range(1..))
                .required(false))
            .arg(Arg::new("big").long("big").help("use big-endian indices").action(ArgAction::SetTrue))
            .arg(Arg::new("shadow").long("shadow").help("create a shadow image").action(ArgAction::SetTrue))
            .arg(Arg::new("nullfmt").long("nullfmt").help("format of null tracks")
                .value_name("FMT")
                .value_parser(value_parser!(u8).range(0..=2))
                .default_value("0"))
            .arg(Arg::new("format").long("format").help("store every track formatted, using this compression")
                .value_name("CODEC")
                .value_parser(["none", "zlib", "bzip2"])
                .required(false))
            .about("write a blank compressed image to the given path")
            .after_help("If cylinders are omitted the base model size is used.")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("completions")
            .arg(Arg::new("shell").short('s').long("shell").help("shell type")
                .value_name("SHELL")
                .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                .required(true))
            .about("write completions script to stdout")
    );
    main_cmd
}
