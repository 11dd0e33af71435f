use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use sclc::error::CompileError;

/// Scratch-Language command line
#[derive(Parser)]
#[command(name = "sclc")]
#[command(about = "Compiler from SCL to stage-runtime project JSON")]
#[command(version)]
struct Cli {
    /// File to compile
    #[arg(long = "infile", short = 'i', conflicts_with = "incode")]
    infile: Option<PathBuf>,

    /// Source passed directly on the command line
    #[arg(long = "incode", short = 'c')]
    incode: Option<String>,

    /// Write the result to a file
    #[arg(long = "outfile", short = 'o', conflicts_with = "outstd")]
    outfile: Option<PathBuf>,

    /// Write the result to standard output
    #[arg(long = "outstd", short = 's')]
    outstd: bool,

    /// Emit the compiled project as JSON
    #[arg(long = "json", short = 'j')]
    json: bool,

    /// Emit the parsed (and optimized) AST's structural dump
    #[arg(long = "ast", short = 'a')]
    ast: bool,

    /// Emit the compiled project packed for sb3 delivery
    #[arg(long = "sb3", short = 'b')]
    sb3: bool,

    /// Emit the lexer's token stream, one per line
    #[arg(long = "tokens", short = 't')]
    tokens: bool,

    /// Parse only, reporting success/failure without lowering
    #[arg(long = "lint", short = 'l')]
    lint: bool,

    /// Python-parity recursion guard; rejects anything too small to be useful
    #[arg(long = "recursionlimit", short = 'r', default_value_t = 2000)]
    recursionlimit: u32,

    /// Suppress the banner and progress output
    #[arg(long = "quite", short = 'q')]
    quite: bool,

    /// Skip the constant-folding optimizer pass
    #[arg(long = "nooptimize", short = 'n')]
    nooptimize: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.recursionlimit <= 10 {
        eprintln!("error: --recursionlimit is too small to be useful");
        std::process::exit(2);
    }
    if cli.infile.is_none() && cli.incode.is_none() {
        eprintln!("error: one of --infile or --incode is required");
        std::process::exit(2);
    }
    if cli.outfile.is_none() && !cli.outstd {
        eprintln!("error: one of --outfile or --outstd is required");
        std::process::exit(2);
    }
    let mode_count = [cli.json, cli.ast, cli.sb3, cli.tokens, cli.lint].iter().filter(|b| **b).count();
    if mode_count != 1 {
        eprintln!("error: exactly one of --json, --ast, --sb3, --tokens, --lint is required");
        std::process::exit(2);
    }
    if cli.sb3 && cli.outfile.is_none() {
        eprintln!("error: --sb3 cannot be written to standard output");
        std::process::exit(2);
    }

    if !cli.quite {
        eprintln!("[sclc] compiling");
    }

    let source = match read_source(&cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let source_dir = cli.infile.as_deref().and_then(Path::parent).unwrap_or_else(|| Path::new(".")).to_path_buf();
    let header_root = source_dir.clone();

    match run(&cli, &source, &source_dir, &header_root) {
        Ok(output) => {
            if let Err(e) = write_output(&cli, &output) {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("{}", err.display_message());
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli, source: &str, source_dir: &Path, header_root: &Path) -> Result<String, CompileError> {
    let optimize = !cli.nooptimize;

    if cli.tokens {
        let tokens = sclc::lexer::tokenize(source)?;
        let tokens = sclc::preprocessor::preprocess(tokens, source_dir, header_root)?;
        return Ok(tokens.iter().map(|t| format!("{t:?}")).collect::<Vec<_>>().join("\n"));
    }

    if cli.lint {
        sclc::parse_to_ast(source, source_dir, header_root)?;
        return Ok(String::new());
    }

    if cli.ast {
        let ast = sclc::parse_to_ast(source, source_dir, header_root)?;
        let ast = if optimize { sclc::optimizer::optimize(ast) } else { ast };
        return Ok(ast.dump());
    }

    let project = sclc::compile(source, source_dir, header_root, optimize, None)?;

    // `sb3` packaging (copying a fixed template ZIP and inserting
    // `project.json`) is an external-collaborator concern: here it's
    // the same compact JSON a real packaging step would insert.
    Ok(serde_json::to_string(&project).expect("project serializes"))
}

fn read_source(cli: &Cli) -> io::Result<String> {
    if let Some(path) = &cli.infile {
        fs::read_to_string(path)
    } else if let Some(code) = &cli.incode {
        Ok(code.clone())
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    }
}

fn write_output(cli: &Cli, output: &str) -> io::Result<()> {
    match &cli.outfile {
        Some(path) => fs::write(path, output),
        None => {
            let mut stdout = io::stdout();
            writeln!(stdout, "{output}")
        }
    }
}
