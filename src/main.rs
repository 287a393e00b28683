//! Quill CLI: run a script file, evaluate a string, or start the REPL.

use std::env;
use std::fs;
use std::path::Path;
use std::process;

use quill_script::module::FileSystemResolver;
use quill_script::{repl, Quill};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI command to execute.
enum Command {
    /// Run a script file.
    Run { file: String },
    /// Evaluate a string.
    Eval { code: String },
    /// Compile a script file to a bytecode image.
    Compile { file: String, out: String },
    /// Run a compiled bytecode image.
    RunBytecode { file: String },
    /// Start the REPL.
    Repl,
}

fn print_usage() {
    eprintln!("Quill {} - an embeddable scripting language", VERSION);
    eprintln!();
    eprintln!("Usage: quill [script.ql]");
    eprintln!("       quill -e <code>");
    eprintln!("       quill compile <script.ql> [-o out.qbc]");
    eprintln!("       quill run <image.qbc>");
    eprintln!();
    eprintln!("With no arguments, starts the interactive shell.");
}

fn parse_args(mut args: Vec<String>) -> Result<Command, String> {
    if args.is_empty() {
        return Ok(Command::Repl);
    }
    match args[0].as_str() {
        "-h" | "--help" => Err(String::new()),
        "-v" | "--version" => {
            println!("quill {}", VERSION);
            process::exit(0);
        }
        "-e" => {
            if args.len() < 2 {
                return Err("missing code after -e".to_string());
            }
            Ok(Command::Eval {
                code: args.remove(1),
            })
        }
        "compile" => {
            if args.len() < 2 {
                return Err("missing input file".to_string());
            }
            let file = args[1].clone();
            let out = match args.iter().position(|a| a == "-o") {
                Some(index) => args
                    .get(index + 1)
                    .cloned()
                    .ok_or_else(|| "missing output file after -o".to_string())?,
                None => Path::new(&file)
                    .with_extension("qbc")
                    .to_string_lossy()
                    .into_owned(),
            };
            Ok(Command::Compile { file, out })
        }
        "run" => {
            if args.len() < 2 {
                return Err("missing image file".to_string());
            }
            Ok(Command::RunBytecode {
                file: args[1].clone(),
            })
        }
        _ => Ok(Command::Run {
            file: args[0].clone(),
        }),
    }
}

fn engine_for(file: &str) -> Quill {
    let base = Path::new(file)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    Quill::with_resolver(Box::new(FileSystemResolver::new(base)))
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = match parse_args(args) {
        Ok(command) => command,
        Err(message) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
                eprintln!();
            }
            print_usage();
            process::exit(if message.is_empty() { 0 } else { 64 });
        }
    };

    match command {
        Command::Repl => {
            if let Err(err) = repl::run() {
                eprintln!("repl error: {}", err);
                process::exit(74);
            }
        }
        Command::Eval { code } => {
            let mut quill = Quill::new();
            run_and_report(&mut quill, &code);
        }
        Command::Run { file } => {
            let source = read_or_die(&file);
            let mut quill = engine_for(&file);
            run_and_report(&mut quill, &source);
        }
        Command::Compile { file, out } => {
            let source = read_or_die(&file);
            let mut quill = engine_for(&file);
            match quill.compile(&source) {
                Ok(bytes) => {
                    if let Err(err) = fs::write(&out, bytes) {
                        eprintln!("cannot write '{}': {}", out, err);
                        process::exit(74);
                    }
                    println!("wrote {}", out);
                }
                Err(err) => {
                    eprintln!("{}", err.report());
                    process::exit(65);
                }
            }
        }
        Command::RunBytecode { file } => {
            let bytes = match fs::read(&file) {
                Ok(bytes) => bytes,
                Err(err) => {
                    eprintln!("cannot read '{}': {}", file, err);
                    process::exit(66);
                }
            };
            let mut quill = engine_for(&file);
            if let Err(err) = quill.load_bytecode(&bytes) {
                eprintln!("{}", err.report());
                process::exit(70);
            }
        }
    }
}

fn read_or_die(file: &str) -> String {
    match fs::read_to_string(file) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("cannot read '{}': {}", file, err);
            process::exit(66);
        }
    }
}

fn run_and_report(quill: &mut Quill, source: &str) {
    if let Err(err) = quill.eval(source) {
        eprintln!("{}", err.report());
        process::exit(70);
    }
}
