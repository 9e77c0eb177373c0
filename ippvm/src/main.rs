#[macro_use]
extern crate clap;

use clap::{App, Arg, ArgGroup, AppSettings};

const USAGE: &str = "\
ippvm: interpreter for IPPcode22 programs delivered as an XML document.

USAGE:
    ippvm --help
    ippvm --source=FILE [--input=FILE]
    ippvm --input=FILE [--source=FILE]

FLAGS:
    --help           Prints this usage text and exits. Must be the only argument.
    --source=FILE    Path to the XML program. Defaults to standard input.
    --input=FILE     Path to the program's input stream. Defaults to standard input.

At least one of --source or --input must be given; whichever is omitted
falls back to standard input. Diagnostic tracing can be enabled with the
RUST_LOG environment variable (e.g. RUST_LOG=debug).\
";

fn build_app() -> App<'static, 'static> {
    app_from_crate!()
        .setting(AppSettings::DisableVersion)
        .setting(AppSettings::DisableHelpFlags)
        .setting(AppSettings::DisableHelpSubcommand)
        .arg(
            Arg::with_name("source")
                .long("source")
                .takes_value(true)
                .value_name("FILE")
                .help("Path to the XML program; defaults to standard input."),
        )
        .arg(
            Arg::with_name("input")
                .long("input")
                .takes_value(true)
                .value_name("FILE")
                .help("Path to the program's input stream; defaults to standard input."),
        )
        .group(
            ArgGroup::with_name("at_least_one")
                .args(&["source", "input"])
                .multiple(true)
                .required(true),
        )
}

fn main() {
    env_logger::init();

    let raw_args: Vec<String> = std::env::args().skip(1).collect();

    // `--help` is handled by hand rather than by clap's own auto-help flag,
    // since it must be the *only* argument on the command line (a bare
    // `--help` alongside other flags is an argument error, not a no-op).
    if raw_args == ["--help"] {
        println!("{}", USAGE);
        std::process::exit(0);
    }
    if raw_args.iter().any(|a| a == "--help") {
        eprintln!("--help must be the only argument");
        std::process::exit(10);
    }

    let matches = match build_app().get_matches_safe() {
        Ok(matches) => matches,
        Err(e) => {
            eprintln!("{}", e.message);
            std::process::exit(10);
        }
    };

    let source = matches.value_of("source");
    let input = matches.value_of("input");

    std::process::exit(ippvm::drive(source, input));
}
