use clap::{value_parser, crate_version, Arg, ArgAction, Command, ValueHint};

const SPEC_HELP: &str = "files inside a multi-disk archive can be selected with a disk prefix,
e.g., `D2:AUTORUN.SYS` is AUTORUN.SYS on the second disk, the default is D1";

fn files_arg(help: &'static str, req: bool, shell_hint: bool) -> Arg {
    let ans = Arg::new("file").value_name("FILES").num_args(1..).required(req).help(help);
    if shell_hint {
        ans.value_hint(ValueHint::FilePath)
    } else {
        ans
    }
}

fn dimg_arg() -> Arg {
    Arg::new("dimg").help("path to disk image, may be compressed or archived")
        .value_name("PATH")
        .value_hint(ValueHint::FilePath)
        .required(true)
}

fn out_arg(help: &'static str) -> Arg {
    Arg::new("out").short('o').long("out").help(help)
        .value_name("PATH")
        .value_hint(ValueHint::AnyPath)
        .required(false)
}

fn force_arg() -> Arg {
    Arg::new("force").long("force").help("overwrite an existing image")
        .action(ArgAction::SetTrue)
        .required(false)
}

fn indent_arg() -> Arg {
    Arg::new("indent").long("indent").help("JSON indentation, omit to minify")
        .value_name("SPACES")
        .value_parser(value_parser!(u16).range(0..16))
        .required(false)
}

pub fn build_cli() -> Command {
    let long_help = "a8kit is invoked with one of several subcommands, or with a bare image path,
which lists the image.  Images may be compressed (gzip, bzip2, xz, lz4, unix compress, DCM)
and may be collected in tar or zip archives.
Set RUST_LOG environment variable to control logging level.
  levels: trace,debug,info,warn,error

Examples:
---------
catalog of every disk: `a8kit games.zip`
extract files:         `a8kit extract mydisk.atr AUTORUN.SYS -o ./out`
add files:             `a8kit add mydisk.atr game.xex readme.txt`
new DOS 2 image:       `a8kit create blank.atr -t ed`
bootable executable:   `a8kit boot game.xex game.atr --title \"MY GAME\"`";

    let mut main_cmd = Command::new("a8kit")
        .about("Atari 8-bit and Apple II disk, cassette, and cartridge images.")
        .after_long_help(long_help)
        .version(crate_version!())
        .arg(Arg::new("dimg").help("list this image when no subcommand is given")
            .value_name("PATH")
            .value_hint(ValueHint::FilePath)
            .required(false))
        .args_conflicts_with_subcommands(true)
        .arg_required_else_help(true);

    main_cmd = main_cmd.subcommand(
        Command::new("list")
            .arg(dimg_arg())
            .visible_alias("ls")
            .visible_alias("dir")
            .about("list the files on every disk in the image")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("crc")
            .arg(dimg_arg())
            .arg(files_arg("files to check, all files if omitted",false,false))
            .about("print the CRC32 of files inside the image")
            .after_help(SPEC_HELP)
    );
    main_cmd = main_cmd.subcommand(
        Command::new("extract")
            .arg(dimg_arg())
            .arg(files_arg("files to extract, all files if omitted",false,false))
            .arg(out_arg("directory that receives the files"))
            .arg(Arg::new("dump").long("dump").help("display as hex on stdout instead of writing files")
                .action(ArgAction::SetTrue)
                .required(false))
            .visible_alias("x")
            .about("copy files from the image to the host")
            .after_help(SPEC_HELP)
    );
    main_cmd = main_cmd.subcommand(
        Command::new("add")
            .arg(dimg_arg())
            .arg(files_arg("host files to copy into the image",true,true))
            .arg(Arg::new("disk").long("disk").help("target disk in a multi-disk archive, e.g. D2")
                .value_name("LABEL")
                .required(false))
            .arg(out_arg("save to this path instead of overwriting the image"))
            .about("copy host files into the image")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("delete")
            .arg(dimg_arg())
            .arg(files_arg("files to delete",true,false))
            .arg(out_arg("save to this path instead of overwriting the image"))
            .visible_alias("del")
            .visible_alias("era")
            .about("delete files inside the image")
            .after_help(SPEC_HELP)
    );
    main_cmd = main_cmd.subcommand(
        Command::new("create")
            .arg(Arg::new("dimg").help("path of the new image").value_name("PATH")
                .value_hint(ValueHint::FilePath)
                .required(true))
            .arg(Arg::new("type").short('t').long("type").help("disk density").value_name("TYPE")
                .value_parser(["sd","ed","dd"])
                .default_value("sd")
                .required(false))
            .arg(force_arg())
            .about("write a blank Atari DOS 2 image with an ATR header")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("boot")
            .arg(Arg::new("xex").help("Atari executable").value_name("XEX")
                .value_hint(ValueHint::FilePath)
                .required(true))
            .arg(Arg::new("dimg").help("path of the new image").value_name("PATH")
                .value_hint(ValueHint::FilePath)
                .required(true))
            .arg(Arg::new("title").long("title").help("title shown while loading").value_name("TEXT").required(false))
            .arg(Arg::new("author").long("author").help("author shown while loading").value_name("TEXT").required(false))
            .arg(force_arg())
            .about("write a KBoot image that boots into the executable")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("vtoc")
            .arg(dimg_arg())
            .about("show the VTOC fields and the free sector map")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("segments")
            .arg(dimg_arg())
            .arg(Arg::new("session").long("session").help("restore names and annotations from a session file")
                .value_name("PATH")
                .value_hint(ValueHint::FilePath)
                .required(false))
            .about("show the segment tree of every disk")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("menu")
            .arg(dimg_arg())
            .arg(Arg::new("session").long("session").help("also write the session JSON to this path")
                .value_name("PATH")
                .value_hint(ValueHint::FilePath)
                .required(false))
            .arg(indent_arg())
            .about("list segments with their UUIDs")
    );
    return main_cmd;
}
