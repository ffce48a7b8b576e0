use std::{
    fs::File,
    io::{self, BufReader},
};

use anyhow::{anyhow, Context as _};
use clap::{crate_version, App, Arg};
use inkwell::context::Context;

use kaleido_jit::driver::Repl;
use kaleido_jit::lexer::Lexer;
use kaleido_jit::parser::Parser;
use kaleido_jit::session::{Mode, Session, SessionConfig};

fn main() -> anyhow::Result<()> {
    let matches = App::new("kaleido-jit")
        .version(crate_version!())
        .about("interactive jit compiler for a tiny expression language")
        .arg(
            Arg::with_name("mode")
                .short("m")
                .long("mode")
                .takes_value(true)
                .possible_values(&Mode::NAMES)
                .default_value("jit")
                .help("parse only, print IR, or evaluate with the JIT"),
        )
        .arg(
            Arg::with_name("no-opt")
                .long("no-opt")
                .help("skip the per-function optimization passes"),
        )
        .arg(
            Arg::with_name("FILE")
                .index(1)
                .help("read the program from FILE instead of stdin"),
        )
        .get_matches();

    let mode: Mode = matches
        .value_of("mode")
        .unwrap_or("jit")
        .parse()
        .map_err(|e| anyhow!("{}", e))?;
    let config = SessionConfig {
        mode,
        optimize: !matches.is_present("no-opt"),
    };

    let context = Context::create();
    let session = Session::new(&context, config)?;

    let stdin = io::stdin();
    let mut lexer = match matches.value_of("FILE") {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("failed to open {}", path))?;
            Lexer::new(BufReader::new(file))
        }
        None => Lexer::new(stdin.lock()),
    };

    let interactive = matches.value_of("FILE").is_none();
    let mut repl = Repl::new(Parser::default(), session, io::stdout(), io::stderr())
        .interactive(interactive);
    repl.run(&mut lexer)?;

    if let Some(e) = lexer.io_error() {
        return Err(anyhow!("failed to read input: {}", e));
    }

    Ok(())
}
