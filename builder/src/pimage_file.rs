// Licensed under the Apache-2.0 license

use anyhow::{anyhow, bail, Result};
use log::{debug, info, warn};
use pimage::{
    build_bundle, build_image, decode_header, split_image_blocks, split_image_blocks_forced,
    PimageConfig, ValidationReport, BUNDLE_IMAGE_COUNT,
};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Header reports for every block found in a stamped file.
#[derive(Debug, Serialize)]
pub struct DecodedImage {
    pub blocks: Vec<ValidationReport>,
}

impl DecodedImage {
    pub fn image_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_valid(&self) -> bool {
        self.blocks.iter().all(ValidationReport::is_valid)
    }
}

impl fmt::Display for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.blocks.as_slice() {
            [report] => {
                writeln!(f, "Input file contains a single image:")?;
                write!(f, "{}", report)
            }
            blocks => {
                writeln!(f, "Input file contains four images:")?;
                for (idx, report) in blocks.iter().enumerate() {
                    writeln!(f, "Image: {}", idx)?;
                    write!(f, "{}", report)?;
                }
                Ok(())
            }
        }
    }
}

fn load_file(path: &Path) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut file = File::open(path)
        .map_err(|e| anyhow!(format!("Cannot open file '{}': {}", path.display(), e)))?;
    file.read_to_end(&mut buffer)
        .map_err(|e| anyhow!(format!("Cannot read file '{}': {}", path.display(), e)))?;
    debug!("Loaded {} bytes from {}", buffer.len(), path.display());
    Ok(buffer)
}

/// Fails on the first source that does not exist, before any file is read.
pub fn check_sources_exist(sources: &[PathBuf]) -> Result<()> {
    for source in sources {
        if !source.exists() {
            bail!("No such file or directory: {}", source.display());
        }
    }
    Ok(())
}

/// Stamps one source into a single block image, or four sources into a
/// bundle, and writes the result to `output`.
pub fn pimage_create(sources: &[PathBuf], config: &PimageConfig, output: &Path) -> Result<()> {
    check_sources_exist(sources)?;

    let image = match sources.len() {
        1 => {
            let payload = load_file(&sources[0])?;
            build_image(&payload, config)?
        }
        BUNDLE_IMAGE_COUNT => {
            let payloads = sources
                .iter()
                .map(|source| load_file(source))
                .collect::<Result<Vec<_>>>()?;
            build_bundle(&payloads, config)?
        }
        count => bail!(
            "Expected 1 or {} source files, got {}",
            BUNDLE_IMAGE_COUNT,
            count
        ),
    };

    let mut file = File::create(output)
        .map_err(|e| anyhow!(format!("Unable to create file {}: {}", output.display(), e)))?;
    if let Err(e) = file.write_all(&image) {
        drop(file);
        let _ = std::fs::remove_file(output);
        bail!("Unable to write file {}: {}", output.display(), e);
    }
    info!(
        "Wrote {} byte image ({} KiB alignment) to {}",
        image.len(),
        config.alignment.kib(),
        output.display()
    );
    Ok(())
}

/// Splits `image` into blocks and decodes the header of each one. With
/// `force`, a file that is not one or four blocks long is decoded as a
/// single unpadded image.
pub fn decode_image(image: &[u8], config: &PimageConfig, force: bool) -> Result<DecodedImage> {
    let blocks = if force {
        split_image_blocks_forced(image, config)?
    } else {
        split_image_blocks(image, config).map_err(|e| {
            anyhow!(
                "{}; use --force to decode an unpadded image or check the alignment",
                e
            )
        })?
    };

    let blocks = blocks
        .into_iter()
        .map(decode_header)
        .collect::<Result<Vec<_>, _>>()?;
    for (idx, report) in blocks.iter().enumerate() {
        if !report.is_valid() {
            warn!("Image {} failed header validation", idx);
        }
    }
    Ok(DecodedImage { blocks })
}

pub fn pimage_decode(path: &Path, config: &PimageConfig, force: bool) -> Result<DecodedImage> {
    check_sources_exist(&[path.to_path_buf()])?;
    let image = load_file(path)?;
    decode_image(&image, config, force)
}
