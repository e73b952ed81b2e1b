use std::path::PathBuf;
use std::process;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;

use longsort::creator;
use longsort::options::CreatorOptions;

#[derive(Parser)]
#[command(name = "lfgen", about = "Generate a test file of delimited rows with repeats")]
struct Cli {
    /// File to create
    output: PathBuf,

    /// Approximate size of the generated file, in bytes
    #[arg(short = 's', long = "size", value_name = "BYTES")]
    size_bytes: u64,

    /// Use DIR for transient verification files
    #[arg(short = 'T', long = "working-directory", value_name = "DIR", default_value = ".")]
    working_dir: PathBuf,

    /// Output text encoding
    #[arg(long = "encoding", value_name = "NAME", default_value = "utf-8")]
    encoding: String,

    /// Start the file with the encoding's byte-order mark
    #[arg(long = "bom")]
    with_bom: bool,

    /// Alphabet for the number part
    #[arg(long = "digits", value_name = "CHARS", default_value = "0123456789")]
    number_digits: String,

    /// Target number part length
    #[arg(long = "number-length", value_name = "N", default_value_t = 10)]
    number_length: u64,

    /// Allowed deviation from the number part length
    #[arg(long = "number-variation", value_name = "N", default_value_t = 5)]
    number_variation: u64,

    /// Alphabet for the string part
    #[arg(
        long = "symbols",
        value_name = "CHARS",
        default_value = "abcdefghijklmnopqrstuvwxyz "
    )]
    string_symbols: String,

    /// Target string part length
    #[arg(long = "string-length", value_name = "N", default_value_t = 64)]
    string_length: u64,

    /// Allowed deviation from the string part length
    #[arg(long = "string-variation", value_name = "N", default_value_t = 32)]
    string_variation: u64,

    /// Fixed seed for reproducible output
    #[arg(long = "seed", value_name = "SEED")]
    seed: Option<u64>,

    /// Verify the generated file afterwards
    #[arg(long = "verify")]
    verify: bool,
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let options = CreatorOptions {
        source_path: cli.output,
        working_dir: cli.working_dir,
        encoding_name: cli.encoding,
        with_bom: cli.with_bom,
        size_bytes: cli.size_bytes,
        number_digits: cli.number_digits,
        number_length: cli.number_length,
        number_variation: cli.number_variation,
        string_symbols: cli.string_symbols,
        string_length: cli.string_length,
        string_variation: cli.string_variation,
        seed: cli.seed,
    };

    let started = Instant::now();
    let report = creator::process(&options)
        .with_context(|| format!("generating {}", options.source_path.display()))?;
    println!(
        "generated {} rows ({} bytes) in {:.2?}",
        report.rows,
        report.bytes,
        started.elapsed()
    );

    if cli.verify {
        creator::verify(&options)
            .with_context(|| format!("verifying {}", options.source_path.display()))?;
    }
    Ok(())
}

fn main() {
    if let Err(error) = run(Cli::parse()) {
        eprintln!("lfgen: {:#}", error);
        process::exit(1);
    }
}
