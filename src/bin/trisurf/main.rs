//! Trisurf CLI - Loop subdivision for OBJ meshes.
//!
//! Usage: trisurf [OPTIONS] <INPUT>
//!
//! Run `trisurf --help` for available options.

use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;

use trisurf::io;
use trisurf::subdivide::SubdivideOptions;

#[derive(Parser)]
#[command(name = "trisurf")]
#[command(author, version, about = "Loop subdivision for triangle meshes", long_about = None)]
struct Cli {
    /// Input mesh file (.obj)
    input: PathBuf,

    /// Number of subdivision passes
    #[arg(short, long, default_value = "3")]
    subdivisions: usize,

    /// Output location, or - for stdout
    #[arg(short, long, default_value = "-")]
    output: String,

    /// Validate the half-edge graph after linking and after every pass
    #[arg(short, long)]
    check: bool,

    /// Print surface statistics to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Use single-threaded execution (for benchmarking)
    #[arg(long)]
    sequential: bool,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut surface = io::load(&cli.input)?;
    if cli.check {
        surface.validate()?;
    }

    let options = SubdivideOptions::default().with_parallel(!cli.sequential);

    let start = Instant::now();
    for _ in 0..cli.subdivisions {
        surface.subdivide_with(&options)?;
        if cli.check {
            surface.validate()?;
        }
    }
    let elapsed = start.elapsed();

    if cli.verbose {
        eprintln!("{}", surface.stats());
        eprintln!(
            "Subdivided {} times in {:.2?}",
            cli.subdivisions, elapsed
        );
    }

    if cli.output == "-" {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        out.write_all(io::obj::render(&surface).as_bytes())?;
    } else {
        io::save(&surface, &cli.output)?;
    }

    Ok(())
}
