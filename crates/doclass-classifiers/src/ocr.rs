//! OCR for scanned documents
//!
//! Pages are binarized with an Otsu-selected threshold before recognition,
//! which keeps faint scans and uneven backgrounds legible to Tesseract.

use crate::config::OcrConfig;
use doclass_core::{Error, Result};
use image::{GrayImage, ImageFormat, Luma};
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// Trait for OCR backends
pub trait OcrEngine: Send + Sync {
    /// Recognize text in a binarized page image
    fn recognize(&self, image: &GrayImage) -> Result<String>;

    /// Get the engine name
    fn name(&self) -> &str;
}

/// Tesseract driven through its command-line executable
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: PathBuf,
    language: String,
    datapath: Option<PathBuf>,
}

impl TesseractCli {
    /// Create an engine from configuration
    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            language: config.language.clone(),
            datapath: config.datapath.clone(),
        }
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, image: &GrayImage) -> Result<String> {
        let input = tempfile::Builder::new()
            .prefix("doclass-ocr-")
            .suffix(".png")
            .tempfile()?;

        image
            .save_with_format(input.path(), ImageFormat::Png)
            .map_err(|e| Error::extraction(format!("Failed to write OCR input: {}", e)))?;

        let mut command = Command::new(&self.binary);
        command
            .arg(input.path())
            .arg("stdout")
            .args(["-l", &self.language]);
        if let Some(datapath) = &self.datapath {
            command.arg("--tessdata-dir").arg(datapath);
        }

        let output = command.output().map_err(|e| {
            Error::extraction(format!(
                "Failed to run {}: {}",
                self.binary.display(),
                e
            ))
        })?;

        if !output.status.success() {
            return Err(Error::extraction(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("tesseract recognized {} characters", text.chars().count());
        Ok(text)
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

/// Otsu's threshold: the gray level maximizing between-class variance
///
/// Pixels strictly above the returned level belong to the foreground class.
/// A single-valued image has no split and yields 0.
pub fn otsu_level(image: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for Luma([value]) in image.pixels() {
        histogram[*value as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 0;
    }

    let weighted_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, count)| level as f64 * *count as f64)
        .sum();

    let mut background_weight = 0u64;
    let mut background_sum = 0f64;
    let mut best_level = 0u8;
    let mut best_variance = 0f64;

    for (level, count) in histogram.iter().enumerate() {
        background_weight += count;
        if background_weight == 0 {
            continue;
        }
        let foreground_weight = total - background_weight;
        if foreground_weight == 0 {
            break;
        }

        background_sum += level as f64 * *count as f64;
        let background_mean = background_sum / background_weight as f64;
        let foreground_mean = (weighted_total - background_sum) / foreground_weight as f64;

        let variance = background_weight as f64
            * foreground_weight as f64
            * (background_mean - foreground_mean).powi(2);

        if variance > best_variance {
            best_variance = variance;
            best_level = level as u8;
        }
    }

    best_level
}

/// Binary threshold at `level`: above → 255, otherwise → 0
pub fn binarize(image: &GrayImage, level: u8) -> GrayImage {
    let mut binary = image.clone();
    for Luma([value]) in binary.pixels_mut() {
        *value = if *value > level { 255 } else { 0 };
    }
    binary
}
