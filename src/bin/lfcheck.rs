use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::Parser;

use longsort::checker;
use longsort::options::SorterOptions;

#[derive(Parser)]
#[command(name = "lfcheck", about = "Verify that one file is a sorted permutation of another")]
struct Cli {
    /// Original (unsorted) file
    source: PathBuf,

    /// Sorted file to check against the original
    target: PathBuf,

    /// Use DIR for transient index files
    #[arg(short = 'T', long = "working-directory", value_name = "DIR", default_value = ".")]
    working_dir: PathBuf,

    /// Source text encoding
    #[arg(long = "encoding", value_name = "NAME", default_value = "utf-8")]
    encoding: String,

    /// Memory budget for caches and sort buffers, in megabytes
    #[arg(short = 'S', long = "cache-size", value_name = "MB", default_value_t = 512)]
    cache_megabytes: u64,

    /// Allow parallel sorting of the scratch index
    #[arg(long = "parallel")]
    parallel: bool,
}

fn main() {
    let cli = Cli::parse();

    let options = SorterOptions {
        source_path: cli.source,
        target_path: cli.target,
        working_dir: cli.working_dir,
        encoding_name: cli.encoding,
        cache_megabytes: cli.cache_megabytes,
        parallel: cli.parallel,
    };

    let started = Instant::now();
    match checker::process(&options) {
        Ok(()) => println!("all checks passed in {:.2?}", started.elapsed()),
        Err(error) => {
            eprintln!("lfcheck: {}", error);
            process::exit(1);
        }
    }
}
