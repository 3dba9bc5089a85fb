use clap::{Parser, Subcommand};
use std::{
    collections::BTreeSet,
    fs,
    path::PathBuf,
    process::ExitCode
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use datasource::{
    embedded::{self, LoadOptions, MapPolicy},
    hasher::{digest_source, HashType},
    DataSource, FileSource, FileSourceOptions, MemorySource
};

#[derive(Parser)]
#[command(author, version, about, long_about)]
struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command
}

#[derive(Subcommand)]
enum Command {
    /// Hash a file by reading it through a data source
    Hash {
        /// Path to input file.
        input: PathBuf,

        /// Digest type(s): md5, sha1, sha256, sha512; default md5
        #[arg(short = 'd', long = "digest", name = "hash")]
        digests: Vec<HashType>,

        /// Load the file into memory and read it through a memory source
        #[arg(short, long)]
        memory: bool,

        /// Bytes requested per read
        #[arg(short, long, default_value_t = 1048576)]
        chunk: usize,

        /// Read buffer capacity of the file source
        #[arg(long, default_value_t = FileSourceOptions::default().buffer_size)]
        buffer_size: usize
    },
    /// Append a payload to a host file
    Embed {
        host: PathBuf,
        payload: PathBuf,

        /// Output path
        #[arg(short, long)]
        output: PathBuf
    },
    /// Locate and load the payload embedded in a file
    Inspect {
        input: PathBuf,

        /// Digest type(s) to compute over the payload
        #[arg(short = 'd', long = "digest", name = "hash")]
        digests: Vec<HashType>,

        /// Read the payload into memory instead of mapping it
        #[arg(long)]
        no_mmap: bool
    },
    /// Write the payload embedded in a file to another file
    Extract {
        input: PathBuf,

        /// Output path
        #[arg(short, long)]
        output: PathBuf
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn digest_set(digests: Vec<HashType>) -> BTreeSet<HashType> {
    if digests.is_empty() {
        BTreeSet::from([HashType::MD5])
    }
    else {
        digests.into_iter().collect()
    }
}

fn print_digests<S: DataSource + ?Sized>(
    src: &mut S,
    digests: BTreeSet<HashType>,
    chunk: usize
)
{
    let (hashes, len) = digest_source(src, digests.iter().copied(), chunk);

    println!("Bytes read: {len} of {}", src.size());
    for h in &digests {
        println!("{:<7} {}", format!("{h}:"), hashes[h]);
    }
}

fn hash(
    input: PathBuf,
    digests: Vec<HashType>,
    memory: bool,
    chunk: usize,
    buffer_size: usize
) -> Result<(), Box<dyn std::error::Error>>
{
    let digests = digest_set(digests);

    if memory {
        let data = fs::read(&input)?;
        debug!("read {} bytes from {}", data.len(), input.display());
        print_digests(&mut MemorySource::new(&data), digests, chunk);
    }
    else {
        let options = FileSourceOptions { buffer_size };
        let mut src = FileSource::open_with(&input, &options)?;
        print_digests(&mut src, digests, chunk);
    }

    Ok(())
}

fn inspect(
    input: PathBuf,
    digests: Vec<HashType>,
    no_mmap: bool
) -> Result<(), Box<dyn std::error::Error>>
{
    let loc = embedded::locate(&input)?;

    let options = LoadOptions {
        map_policy: if no_mmap { MapPolicy::Never } else { MapPolicy::Auto }
    };
    let payload = embedded::load(&input, &options)?;

    println!("Payload offset: {}", loc.offset);
    println!("Payload length: {}", loc.len);
    println!("Loaded by:      {}", if payload.is_mapped() { "mmap" } else { "read" });

    if !digests.is_empty() {
        print_digests(&mut payload.source(), digest_set(digests), 1048576);
    }

    Ok(())
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Hash { input, digests, memory, chunk, buffer_size } =>
            hash(input, digests, memory, chunk, buffer_size),
        Command::Embed { host, payload, output } => {
            let len = embedded::append_payload(&host, &payload, &output)?;
            println!("Embedded {len} bytes into {}", output.display());
            Ok(())
        },
        Command::Inspect { input, digests, no_mmap } =>
            inspect(input, digests, no_mmap),
        Command::Extract { input, output } => {
            let payload = embedded::load(&input, &LoadOptions::default())?;
            fs::write(&output, &*payload)?;
            println!("Extracted {} bytes to {}", payload.len(), output.display());
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
