use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::Parser;

use longsort::options::SorterOptions;
use longsort::sorter;

#[derive(Parser)]
#[command(name = "lfsort", about = "Sort huge delimited text files without loading them")]
struct Cli {
    /// File to sort
    source: PathBuf,

    /// Write the sorted rows to FILE
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: PathBuf,

    /// Use DIR for the transient index file
    #[arg(short = 'T', long = "working-directory", value_name = "DIR", default_value = ".")]
    working_dir: PathBuf,

    /// Source text encoding
    #[arg(long = "encoding", value_name = "NAME", default_value = "utf-8")]
    encoding: String,

    /// Memory budget for caches and sort buffers, in megabytes
    #[arg(short = 'S', long = "cache-size", value_name = "MB", default_value_t = 512)]
    cache_megabytes: u64,

    /// Allow parallel sorting when rows are long enough to benefit
    #[arg(long = "parallel")]
    parallel: bool,

    /// Limit the worker thread pool to N threads
    #[arg(long = "threads", value_name = "N")]
    threads: Option<usize>,
}

fn main() {
    let cli = Cli::parse();

    if let Some(threads) = cli.threads {
        if let Err(error) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
        {
            eprintln!("lfsort: {}", error);
            process::exit(2);
        }
    }

    let options = SorterOptions {
        source_path: cli.source,
        target_path: cli.output,
        working_dir: cli.working_dir,
        encoding_name: cli.encoding,
        cache_megabytes: cli.cache_megabytes,
        parallel: cli.parallel,
    };

    let started = Instant::now();
    match sorter::process(&options) {
        Ok(report) => {
            println!(
                "sorted {} rows in {:.2?}{}",
                report.rows,
                started.elapsed(),
                if report.parallel { " (parallel)" } else { "" }
            );
        }
        Err(error) => {
            eprintln!("lfsort: {}", error);
            process::exit(1);
        }
    }
}
