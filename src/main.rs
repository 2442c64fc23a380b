//! atomtron - fact loader CLI

use atomtron::backend::*;
use atomtron::scanner::Scanner;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    eprintln!("atomtron v{}", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    atomtron [OPTIONS] <INPUT>");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -h, --help             Print this help message");
    eprintln!("    -v, --version          Print version information");
    eprintln!("    -c, --config <FILE>    Read runtime settings from a TOML file");
    eprintln!("    -o, --output <FILE>    Write the fact listing to a file instead of stdout");
    eprintln!("    --allow-duplicates     Accept facts identical to earlier ones");
    eprintln!("    --stats                Print table and memory statistics at the end");
    eprintln!("    --verbose              Log sweeps and resizes");
    eprintln!();
    eprintln!("ARGUMENTS:");
    eprintln!("    <INPUT>                File of fact literals (use '-' for stdin)");
    eprintln!();
    eprintln!("EXAMPLES:");
    eprintln!("    atomtron facts.clp");
    eprintln!("    atomtron --stats -c atomtron.toml facts.clp");
    eprintln!("    atomtron -o listing.txt facts.clp");
    eprintln!("    cat facts.clp | atomtron -");
}

fn print_version() {
    println!("atomtron {}", VERSION);
}

struct Options {
    input: Option<String>,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    allow_duplicates: bool,
    show_stats: bool,
    verbose: bool,
}

/// Value following a flag such as `-c FILE`.
fn flag_value(
    args: &mut impl Iterator<Item = String>,
    flag: &str,
    what: &str,
) -> Result<String, String> {
    args.next()
        .ok_or_else(|| format!("Missing {} after {}", what, flag))
}

fn parse_args() -> Result<Options, String> {
    let mut options = Options {
        input: None,
        output: None,
        config: None,
        allow_duplicates: false,
        show_stats: false,
        verbose: false,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                process::exit(0);
            }
            "-c" | "--config" => {
                options.config = Some(PathBuf::from(flag_value(&mut args, &arg, "config file")?));
            }
            "-o" | "--output" => {
                options.output = Some(PathBuf::from(flag_value(&mut args, &arg, "output file")?));
            }
            "--allow-duplicates" => options.allow_duplicates = true,
            "--stats" => options.show_stats = true,
            "--verbose" => options.verbose = true,
            flag if flag.len() > 1 && flag.starts_with('-') => {
                return Err(format!("Unknown option: {}", flag));
            }
            _ if options.input.is_some() => {
                return Err("Multiple input files specified".to_string());
            }
            path => options.input = Some(path.to_string()),
        }
    }

    Ok(options)
}

/// Fact source text; `-` is stdin.
fn read_input(input: &str) -> Result<String, String> {
    if input == "-" {
        return io::read_to_string(io::stdin())
            .map_err(|e| format!("Failed to read facts from stdin: {}", e));
    }
    fs::read_to_string(input).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => format!("Fact file not found: {}", input),
        _ => format!("Failed to read fact file '{}': {}", input, e),
    })
}

/// Write the listing (and statistics) to `output`, or stdout when absent.
fn write_output(output: Option<&Path>, content: &str) -> Result<(), String> {
    match output {
        Some(path) => fs::write(path, content)
            .map_err(|e| format!("Failed to write '{}': {}", path.display(), e)),
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(content.as_bytes())
                .and_then(|_| stdout.flush())
                .map_err(|e| format!("Failed to write to stdout: {}", e))
        }
    }
}

fn format_field(env: &Environment, field: &Field) -> String {
    match field {
        Field::Symbol(atom) => env.symbol_text(*atom).to_string(),
        Field::String(atom) => format!("{:?}", env.symbol_text(*atom)),
        Field::Integer(atom) => env.integer_value(*atom).to_string(),
        Field::Float(atom) => format!("{:?}", env.float_value(*atom)),
        Field::ExternalAddress(atom) => {
            let address = env.external_address(*atom);
            format!("<Pointer-{}-{:#x}>", address.type_id, address.address)
        }
        Field::FactAddress(id) => format!("<Fact-{}>", id.0),
        Field::Multifield(nested) => {
            let formatted: Vec<String> = nested.iter().map(|f| format_field(env, f)).collect();
            format!("({})", formatted.join(" "))
        }
    }
}

fn format_fact(env: &Environment, template: SymbolAtom, fields: &[Field]) -> String {
    let mut parts = vec![env.symbol_text(template).to_string()];
    parts.extend(fields.iter().map(|f| format_field(env, f)));
    format!("({})", parts.join(" "))
}

/// Assert every fact literal in `input`, returning the listing to print.
fn load_facts(env: &mut Environment, input: &str) -> Result<String, String> {
    let mut scanner = Scanner::new(input);
    let mut output = String::new();
    let mut duplicates = 0;

    loop {
        // Literals are scanned one level down so that rejected duplicates are
        // reclaimed by the next cleanup.
        env.enter_evaluation();
        let literal = scanner.read_fact(env);
        let outcome = match literal {
            Ok(Some(literal)) => {
                let text = format_fact(env, literal.template, &literal.fields);
                Some((env.assert_fact(literal.template, literal.fields), text))
            }
            Ok(None) => None,
            Err(e) => {
                env.exit_evaluation();
                return Err(format!("Scan error: {}", e));
            }
        };
        env.exit_evaluation();

        let Some((outcome, text)) = outcome else {
            break;
        };
        match outcome {
            AssertOutcome::Asserted(id) => {
                output.push_str(&format!("{:<6} {}\n", id.to_string(), text));
            }
            AssertOutcome::Duplicate(existing) => {
                duplicates += 1;
                eprintln!("Duplicate of {}: {}", existing, text);
            }
        }

        if let Some(stats) = env.periodic_cleanup() {
            debug!(target: "atomtron::cli", freed = stats.freed, "Cleanup during load");
        }
    }

    env.remove_ephemeral_atoms();
    info!(
        target: "atomtron::cli",
        facts = env.fact_count(),
        duplicates,
        "Loaded facts"
    );
    Ok(output)
}

fn format_stats(env: &Environment) -> String {
    let atoms = env.atoms();
    let memory = env.memory_stats();
    let ephemeral = env.ephemeral_stats();
    let index = env.fact_hash_table();

    let mut out = String::new();
    out.push_str(&format!("symbols:            {}\n", atoms.symbols.len()));
    out.push_str(&format!("floats:             {}\n", atoms.floats.len()));
    out.push_str(&format!("integers:           {}\n", atoms.integers.len()));
    out.push_str(&format!("bitmaps:            {}\n", atoms.bitmaps.len()));
    out.push_str(&format!("external addresses: {}\n", atoms.external_addresses.len()));
    out.push_str(&format!(
        "ephemeral items:    {} ({} bytes)\n",
        ephemeral.item_count, ephemeral.item_size
    ));
    out.push_str(&format!(
        "facts:              {} (hash table size {})\n",
        env.fact_count(),
        index.size()
    ));
    out.push_str(&format!("memory in use:      {} bytes\n", memory.mem_used));
    out.push_str(&format!("memory requests:    {}\n", memory.mem_requests));
    out.push_str(&format!("memory pooled:      {} bytes\n", memory.pool_size));
    out
}

fn main() {
    let options = match parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    let filter = if options.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let Some(input) = options.input.as_deref() else {
        eprintln!("Error: Missing input file");
        eprintln!();
        print_usage();
        process::exit(1);
    };

    let mut config = match &options.config {
        Some(path) => match RuntimeConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        None => RuntimeConfig::default(),
    };
    if options.allow_duplicates {
        config.facts.allow_duplicates = true;
    }

    let input_content = match read_input(input) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let mut env = Environment::new(config);
    let mut listing = match load_facts(&mut env, &input_content) {
        Ok(listing) => listing,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    if options.show_stats {
        listing.push_str(&format_stats(&env));
    }

    if let Err(e) = write_output(options.output.as_deref(), &listing) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
