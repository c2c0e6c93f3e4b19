// Licensed under the Apache-2.0 license

//! Preloader image tool.
//!
//! Pads one raw image, or four copies, to the flash block alignment and
//! stamps each block with a validation header and CRC. With `--decode` it
//! prints the headers found in an existing image instead.
//!
//! ```bash
//! mkpimage -a 256 -o preloader.bin u-boot-spl.bin
//! mkpimage -o preloader-x4.bin spl.bin spl.bin spl.bin spl.bin
//! mkpimage --decode preloader.bin
//! ```

use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser};
use clap_num::maybe_hex;
use log::{warn, LevelFilter};
use pimage::{Alignment, PimageConfig};
use pimage_builder::{pimage_create, pimage_decode};
use simple_logger::SimpleLogger;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Creates and decodes preloader image headers", long_about = None)]
struct Cli {
    /// Header version to be created
    #[arg(short = 'v', long = "header-version", default_value_t = 0)]
    header_version: u8,

    /// Address alignment in kilobytes: 64, 128, 256, 512, 1024, 2048 or 4096.
    /// Override if the NAND flash has a larger block size
    #[arg(short, long, default_value = "64", value_parser = parse_alignment)]
    alignment: Alignment,

    /// Decode the header information from the input file and display it
    #[arg(short, long, default_value_t = false)]
    decode: bool,

    /// Force decoding even if the input file is an unpadded image
    #[arg(short, long, default_value_t = false, requires = "decode")]
    force: bool,

    /// Print the decoded headers as JSON
    #[arg(long, default_value_t = false, requires = "decode")]
    json: bool,

    /// Output file, relative and absolute path supported
    #[arg(short, long, value_name = "OUTPUT", required_unless_present = "decode")]
    output: Option<PathBuf>,

    /// Increase logging verbosity
    #[arg(long, action = ArgAction::Count)]
    verbose: u8,

    /// One source image, or four to build a bundle
    #[arg(value_name = "SOURCE", required = true, num_args = 1..)]
    sources: Vec<PathBuf>,
}

impl Cli {
    fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    }

    fn config(&self) -> Result<PimageConfig> {
        let config = PimageConfig {
            alignment: self.alignment,
            version: self.header_version,
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_alignment(s: &str) -> Result<Alignment, String> {
    let kib = maybe_hex::<u32>(s)?;
    Alignment::from_kib(kib).map_err(|e| e.to_string())
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.config()?;

    if cli.decode {
        if cli.sources.len() > 1 {
            warn!("Only the first source is decoded");
        }
        let decoded = pimage_decode(&cli.sources[0], &config, cli.force)?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&decoded)?);
        } else {
            print!("{}", decoded);
        }
        return Ok(());
    }

    let output = cli
        .output
        .as_deref()
        .ok_or_else(|| anyhow!("You must give an output destination."))?;
    pimage_create(&cli.sources, &config, output)?;
    println!("Created preloader image: {}", output.display());
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let _ = SimpleLogger::new().with_level(cli.log_level()).init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
