use clap::{crate_version, App, Arg, ArgMatches, ErrorKind};
use lextree::{Diagnostics, Dump, ExitStatus, Lox};
use std::fs;
use std::io::{self, BufRead, Write};
use std::process;
use std::str::FromStr;

fn main() {
    init_tracing();
    let matches = parse_args();
    let dump = match matches.value_of("dump").map(Dump::from_str).transpose() {
        Ok(dump) => dump,
        Err(e) => {
            eprintln!("Invalid --dump value: {}", e);
            exit(ExitStatus::Usage);
        }
    };
    let status = match matches.value_of("script") {
        Some(path) => run_file(path, dump),
        None => run_prompt(dump),
    };
    exit(status);
}

fn parse_args() -> ArgMatches<'static> {
    let app = App::new("lextree")
        .version(crate_version!())
        .about("Tree-walking interpreter for a small dynamically typed scripting language")
        .arg(
            Arg::with_name("script")
                .help("Script to run; starts an interactive session when omitted")
                .index(1),
        )
        .arg(
            Arg::with_name("dump")
                .long("dump")
                .takes_value(true)
                .value_name("FORM")
                .possible_values(&["tokens", "ast", "rpn"])
                .help("Writes the token stream or syntax tree before executing"),
        );
    match app.get_matches_safe() {
        Ok(matches) => matches,
        Err(e) => match e.kind {
            ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => e.exit(),
            _ => {
                eprintln!("{}", e.message);
                exit(ExitStatus::Usage);
            }
        },
    }
}

fn exit(status: ExitStatus) -> ! {
    process::exit(i32::from(status))
}

/// Installs a stderr log subscriber when `RUST_LOG` is set.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn report(diagnostics: &Diagnostics) {
    for error in diagnostics {
        eprintln!("{}", error);
    }
}

fn run_file(path: &str, dump: Option<Dump>) -> ExitStatus {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            tracing::debug!(%e, path, "failed to read script");
            eprintln!("Could not open file: {}", path);
            return ExitStatus::IoError;
        }
    };
    let mut lox = Lox::new(io::stdout()).with_dump(dump);
    match lox.run(&source) {
        Ok(diagnostics) => {
            report(&diagnostics);
            diagnostics.exit_status()
        }
        Err(e) => {
            eprintln!("{}", lextree::Error::from(e));
            ExitStatus::IoError
        }
    }
}

fn run_prompt(dump: Option<Dump>) -> ExitStatus {
    let mut lox = Lox::new(io::stdout()).with_dump(dump);
    let stdin = io::stdin();
    let mut input = stdin.lock();
    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            return ExitStatus::IoError;
        }
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("Could not read input: {}", e);
                return ExitStatus::IoError;
            }
        }
        match lox.run_line(&line) {
            Ok(Some(diagnostics)) => report(&diagnostics),
            Ok(None) => break,
            Err(e) => {
                eprintln!("{}", lextree::Error::from(e));
                return ExitStatus::IoError;
            }
        }
    }
    ExitStatus::Success
}
