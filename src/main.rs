use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;

use c64asm::assembler::Assembler;
use c64asm::logging;
use c64asm::opcodes::Cpu;

const USAGE: &str = "usage: c64asm [options] <input.asm>
  -o <file>         output file (default: input stem + .prg)
  -f <prg|raw>      output format (default: prg)
  -l <file>         write an assembly listing
  -s <file>         write a VICE symbol file
  -I <dir>          add an include search path (repeatable)
  -D NAME[=VALUE]   define a constant symbol (repeatable)
  --cpu <type>      6502, 6510 or 65c02 (default: 6510)
  --max-errors <n>  give up after this many errors (default: 20)
  --cycles          show cycle counts in the listing
  -v                verbose logging";

struct Options {
    input: PathBuf,
    output: PathBuf,
    raw: bool,
    listing: Option<PathBuf>,
    symbols: Option<PathBuf>,
}

fn usage_error(message: &str) -> ! {
    logging::error(message.to_string());
    eprintln!("{}", USAGE);
    process::exit(1);
}

fn parse_options(assembler: &mut Assembler) -> Options {
    let args: Vec<String> = env::args().collect();
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut raw = false;
    let mut listing = None;
    let mut symbols = None;

    let mut index = 1;
    let value_of = |index: &mut usize| -> String {
        *index += 1;
        match args.get(*index) {
            Some(value) => value.clone(),
            None => usage_error(&format!("option {} needs a value", args[*index - 1])),
        }
    };

    while index < args.len() {
        match args[index].as_str() {
            "-o" => output = Some(PathBuf::from(value_of(&mut index))),
            "-f" => match value_of(&mut index).as_str() {
                "prg" => raw = false,
                "raw" => raw = true,
                other => usage_error(&format!("unknown output format \"{}\"", other)),
            },
            "-l" => listing = Some(PathBuf::from(value_of(&mut index))),
            "-s" => symbols = Some(PathBuf::from(value_of(&mut index))),
            "-I" => assembler.add_include_path(PathBuf::from(value_of(&mut index))),
            "-D" => {
                let define = value_of(&mut index);
                if let Err(error) = assembler.add_cli_define(&define) {
                    usage_error(&error.to_string());
                }
            }
            "--cpu" => {
                let name = value_of(&mut index);
                match Cpu::parse(&name) {
                    Some(cpu) => assembler.set_cpu(cpu),
                    None => usage_error(&format!("unknown processor \"{}\"", name)),
                }
            }
            "--max-errors" => {
                let count = value_of(&mut index);
                match count.parse::<usize>() {
                    Ok(count) if count > 0 => assembler.set_max_errors(count),
                    _ => usage_error(&format!("bad error limit \"{}\"", count)),
                }
            }
            "--cycles" => assembler.set_cycle_listing(true),
            "-v" => {}
            "-h" | "--help" => {
                println!("{}", USAGE);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                usage_error(&format!("unknown option \"{}\"", other))
            }
            _ => {
                if input.is_some() {
                    usage_error("more than one input file given");
                }
                input = Some(PathBuf::from(&args[index]));
            }
        }
        index += 1;
    }

    let Some(input) = input else {
        usage_error("no input file given");
    };
    let output = output.unwrap_or_else(|| {
        input.with_extension(if raw { "bin" } else { "prg" })
    });
    Options {
        input,
        output,
        raw,
        listing,
        symbols,
    }
}

fn write_or_die(path: &PathBuf, bytes: &[u8]) {
    fs::write(path, bytes).unwrap_or_else(|error| {
        logging::error(format!(
            "failed to write {}: {}",
            path.display(),
            error
        ));
        process::exit(3);
    });
}

fn main() {
    let verbose = env::args().any(|argument| argument == "-v");
    let mut builder = env_logger::Builder::from_default_env();
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    let mut assembler = Assembler::new();
    assembler.add_include_paths_from_env("C64ASM_INCLUDE", ':');
    let options = parse_options(&mut assembler);

    let ok = assembler.assemble_file(&options.input);
    logging::report_all(assembler.diagnostics());
    if !ok {
        logging::error(format!(
            "assembly failed with {} error(s)",
            assembler.error_count()
        ));
        process::exit(2);
    }

    let image = if options.raw {
        assembler.raw_bytes()
    } else {
        assembler.prg_bytes()
    };
    match image {
        Some(bytes) => {
            write_or_die(&options.output, &bytes);
            println!(
                "wrote {} bytes to {}",
                bytes.len(),
                options.output.display()
            );
        }
        None => logging::warning("no bytes were emitted, skipping output file".to_string()),
    }

    if let Some(path) = &options.listing {
        write_or_die(path, assembler.listing().as_bytes());
    }
    if let Some(path) = &options.symbols {
        write_or_die(path, assembler.symbol_file().as_bytes());
    }
}
