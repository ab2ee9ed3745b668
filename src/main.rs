use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;

use vibcodec::interface::{FileDecoder, FileEncoder};

/// Compress and reconstruct vibrotactile signal files.
///
/// Every `.wav`, `.txt` or `.csv` file in the input folder is encoded into
/// the compressed folder, then every compressed file is decoded into the
/// output folder.
#[derive(Parser)]
#[command(name = "vibcodec", version, about)]
struct Cli {
    /// Input folder with original signals
    #[arg(short, long, default_value = "data_original")]
    input: PathBuf,

    /// Folder for compressed .binary files
    #[arg(short, long, default_value = "data_compressed")]
    compressed: PathBuf,

    /// Folder for decoded signals
    #[arg(short, long, default_value = "data_decoded")]
    output: PathBuf,

    /// Bit budget per block
    #[arg(short, long, default_value_t = 120)]
    budget: usize,

    /// Block length; a power of two between 32 and 512
    #[arg(long = "bl", default_value_t = 512)]
    block_length: usize,

    /// Sampling frequency in Hz, needed for .txt/.csv inputs
    #[arg(long = "fs", default_value_t = 2800)]
    sampling_rate: u32,

    /// Maximum channel count of multichannel streams
    #[arg(long = "ch", default_value_t = 8)]
    max_channels: usize,

    /// Enable multichannel mode
    #[arg(long = "md")]
    multichannel: bool,

    /// Write decoded signals as .txt instead of .wav
    #[arg(long)]
    txt: bool,

    /// Verbose logs (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let verbose = cli.verbose > 0;

    if verbose {
        println!("input folder: {}", cli.input.display());
        println!("compressed folder: {}", cli.compressed.display());
        println!("output folder: {}", cli.output.display());
    }

    let appendix = format!("_{}", cli.budget);
    let encoder = FileEncoder::new(cli.sampling_rate);

    let t0 = Instant::now();
    encoder.encode_folder(
        &cli.input,
        &cli.compressed,
        cli.block_length,
        cli.budget,
        &appendix,
        cli.max_channels,
        cli.multichannel,
    )?;
    if verbose {
        println!("encoding done in {:.3} s", t0.elapsed().as_secs_f64());
    }

    let decoder = FileDecoder::new(cli.txt, cli.sampling_rate);
    let t1 = Instant::now();
    decoder.decode_folder(
        &cli.compressed,
        &cli.output,
        cli.max_channels,
        cli.multichannel,
    )?;
    if verbose {
        println!("decoding done in {:.3} s", t1.elapsed().as_secs_f64());
    }

    Ok(())
}
