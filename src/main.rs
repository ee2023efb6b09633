use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use roxide as lox;

use clap::Parser as ClapParser;
use log::info;

use lox::interpreter::Interpreter;
use lox::parser::Parser;
use lox::reporter::Reporter;
use lox::resolver::Resolver;
use lox::scanner::Scanner;
use lox::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a .lox script; starts the REPL when omitted
    script: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Cli = match Cli::try_parse() {
        Ok(args) => args,

        Err(err) => {
            // Help and version requests are not usage errors.
            let code = if err.use_stderr() { 64 } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    match args.script {
        Some(path) => run_file(&path),

        None => run_prompt(),
    }
}

fn run_file(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        eprintln!("{} does not exist", path.display());
        std::process::exit(64);
    }

    if path.extension().and_then(|ext| ext.to_str()) != Some("lox") {
        eprintln!("Not a Lox file");
        std::process::exit(64);
    }

    let mut source = String::new();
    let mut reader: BufReader<File> = match File::open(path) {
        Ok(file) => BufReader::new(file),

        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(64);
        }
    };

    // read_to_string also validates the source as UTF-8, which the
    // scanner relies on when slicing lexemes.
    if let Err(err) = reader.read_to_string(&mut source) {
        eprintln!("{}", err);
        std::process::exit(64);
    }

    let mut interpreter = Interpreter::new();
    let mut reporter = Reporter::new();

    run(&source, &mut interpreter, &mut reporter);

    if reporter.had_error() {
        std::process::exit(65);
    }

    if reporter.had_runtime_error() {
        std::process::exit(70);
    }

    Ok(())
}

fn run_prompt() -> anyhow::Result<()> {
    let mut interpreter = Interpreter::new();
    let mut reporter = Reporter::new();

    let stdin = io::stdin();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }

        let line = line.trim_end_matches(&['\n', '\r'][..]);
        if line.is_empty() {
            break;
        }

        run(line, &mut interpreter, &mut reporter);

        // A bad line should not poison the next one.
        reporter.reset();
    }

    Ok(())
}

fn run(source: &str, interpreter: &mut Interpreter, reporter: &mut Reporter) {
    info!("Running {} byte(s) of source", source.len());

    let scanner = Scanner::new(source.as_bytes().to_vec());

    let mut tokens: Vec<Token> = Vec::new();
    for result in scanner {
        match result {
            Ok(token) => tokens.push(token),

            Err(err) => reporter.error(&err),
        }
    }

    let statements = {
        let mut parser = Parser::new(tokens, reporter);
        parser.parse()
    };

    // Halt before interpretation if scanning or parsing reported.
    if reporter.had_error() {
        return;
    }

    {
        let mut resolver = Resolver::new(interpreter);
        if let Err(err) = resolver.resolve(&statements) {
            reporter.error(&err);
            return;
        }
    }

    interpreter.interpret(&statements, reporter);
}
