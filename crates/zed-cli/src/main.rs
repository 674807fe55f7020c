//! The `zed` binary: argument parsing, logging setup, and the top-level
//! run-or-diagnose flow. Exit status is 0 on success and 1 on any
//! compile or runtime error; diagnostics go to stderr as
//! `<filename>:<line>:<col>: <kind>: <msg>`.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use zed_cli::driver::{self, Driver, DEFAULT_MAX_RECORD_LEN};

#[derive(Parser, Debug)]
#[command(name = "zed")]
#[command(about = "Run a ZED program over a sequence of record streams")]
struct Args {
    /// Program file: `.zed` source, or `.zbc` precompiled bytecode
    program: PathBuf,

    /// Data files; `-` denotes standard input. With no data files only
    /// the init and exit programs run.
    data: Vec<String>,

    /// Compile only and write the bytecode to this path
    #[arg(long = "emit-bytecode", value_name = "PATH")]
    emit_bytecode: Option<PathBuf>,

    /// Maximum record length in bytes
    #[arg(long = "max-record-len", default_value_t = DEFAULT_MAX_RECORD_LEN)]
    max_record_len: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    if let Err(message) = run(&args) {
        eprintln!("{message}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), String> {
    let loaded = driver::load_program(&args.program).map_err(|e| e.render(&args.program))?;
    let program_path = args.program.display().to_string();

    if let Some(out_path) = &args.emit_bytecode {
        let mut file = File::create(out_path)
            .map_err(|e| format!("{}: io: {e}", out_path.display()))?;
        zed_codegen::zbc::write_zbc(&mut file, &loaded.program)
            .map_err(|e| format!("{}: io: {e}", out_path.display()))?;
        info!(path = %out_path.display(), "wrote precompiled bytecode");
        return Ok(());
    }

    let mut driver = Driver::new(loaded, args.max_record_len);
    driver
        .run_init()
        .map_err(|d| driver.render(&d, &program_path))?;

    for name in &args.data {
        let result = if name == "-" {
            debug!("reading records from standard input");
            let stdin = io::stdin();
            driver.process_reader("-", stdin.lock())
        } else {
            let file = File::open(name).map_err(|e| format!("{name}: io: {e}"))?;
            driver.process_reader(name, BufReader::new(file))
        };
        result.map_err(|d| driver.render(&d, &program_path))?;
    }

    let output = driver
        .finish()
        .map_err(|d| driver.render(&d, &program_path))?;

    io::stdout()
        .write_all(&output)
        .map_err(|e| format!("stdout: io: {e}"))?;
    Ok(())
}
