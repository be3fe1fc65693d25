//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! compilación y expone una CLI.

use anyhow::{anyhow, Context};
use clap::{self, crate_version, Arg, ArgMatches, Command};
use minijavac::{
    codegen::{bytecode, native, Bug, Target},
    error::Diagnostics,
    lex::Lexer,
    parse,
    semantic::Dump,
    source::Source,
};

use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    rc::Rc,
    str::FromStr,
};

fn main() -> anyhow::Result<()> {
    let args = cli().get_matches();

    // Los volcados se emiten por el log, así que deben ser visibles
    let dump = dumps(&args);
    let level = if dump.is_empty() { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let input = args.value_of("input").context("No input file was given")?;
    let target = args.value_of("target").unwrap_or("c");
    let target = Target::from_str(target).map_err(|()| anyhow!("Bad target: {}", target))?;

    let source = read_source(input)?;
    let lexer = Lexer::new(Rc::clone(&source));
    let eof = lexer.eof();

    let tokens = lexer
        .try_exhaustive()
        .map_err(|errors| report(Diagnostics::from(errors).kind("Lexical error")))?;

    let ast = parse::parse(&tokens, eof)
        .map_err(|error| report(Diagnostics::from(error).kind("Syntax error")))?;

    let elaborated = ast
        .elaborate(dump)
        .map_err(|error| report(Diagnostics::from(error).kind("Semantic error")))?;

    // Toda la salida se genera en memoria antes de tocar el sistema de
    // archivos, de modo que una falla no deje archivos a medias
    let output = args.value_of("output");
    match target {
        Target::Native => {
            let program = native::translate(&elaborated.program).map_err(internal)?;

            let mut text = Vec::new();
            native::write(&program, &mut text)?;

            let path = match output {
                Some(path) => PathBuf::from(path),
                None => default_c_output(input),
            };

            emit(&path, &text)?;
        }

        Target::Bytecode => {
            let units = bytecode::translate(&elaborated.program).map_err(internal)?;

            let mut files = Vec::with_capacity(units.len());
            for unit in &units {
                let mut text = Vec::new();
                bytecode::write(unit, &mut text)?;
                files.push((format!("{}.j", unit.name()), text));
            }

            let directory = Path::new(output.unwrap_or("."));
            for (name, text) in files {
                if directory == Path::new("-") {
                    emit(directory, &text)?;
                } else {
                    emit(&directory.join(name), &text)?;
                }
            }
        }
    }

    Ok(())
}

fn cli() -> Command<'static> {
    Command::new("minijavac")
        .version(crate_version!())
        .about("MiniJava compiler with C and stack-machine back ends")
        .arg(
            Arg::new("input")
                .required(true)
                .value_name("FILE")
                .help("Source file ('-' for stdin)"),
        )
        .arg(
            Arg::new("target")
                .short('t')
                .long("target")
                .value_name("TARGET")
                .takes_value(true)
                .default_value("c")
                .possible_values(["c", "bytecode"])
                .help("Back end to use"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("PATH")
                .help("Output file for C, output directory for bytecode ('-' for stdout)"),
        )
        .arg(
            Arg::new("dump")
                .long("dump")
                .takes_value(true)
                .multiple_occurrences(true)
                .value_name("TABLE")
                .possible_values(["class-table", "locals", "ast"])
                .help("Log intermediate tables during elaboration"),
        )
}

fn dumps(args: &ArgMatches) -> Dump {
    let mut dump = Dump::empty();
    for value in args.values_of("dump").into_iter().flatten() {
        dump |= match value {
            "class-table" => Dump::CLASS_TABLE,
            "locals" => Dump::LOCALS,
            "ast" => Dump::TYPED_AST,
            _ => Dump::empty(),
        };
    }

    dump
}

fn read_source(input: &str) -> anyhow::Result<Rc<Source>> {
    let text = if input == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read from stdin")?;

        text
    } else {
        fs::read_to_string(input).with_context(|| format!("Failed to read: {}", input))?
    };

    let name = if input == "-" { "<stdin>" } else { input };
    Ok(Source::new(name, text))
}

fn default_c_output(input: &str) -> PathBuf {
    let stem = Path::new(input)
        .file_stem()
        .filter(|_| input != "-")
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("a"));

    PathBuf::from(format!("{}.c", stem))
}

fn emit(path: &Path, text: &[u8]) -> anyhow::Result<()> {
    if path == Path::new("-") {
        io::stdout()
            .write_all(text)
            .context("Failed to write to stdout")
    } else {
        log::debug!("writing {}", path.display());
        fs::write(path, text).with_context(|| format!("Failed to write: {}", path.display()))
    }
}

fn report(diagnostics: Diagnostics) -> anyhow::Error {
    eprint!("{}", diagnostics);
    anyhow!("Compilation failed")
}

fn internal(bug: Bug) -> anyhow::Error {
    anyhow!("internal compiler error: {}", bug)
}
