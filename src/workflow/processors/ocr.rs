//! Text extraction backed by the `tesseract` command line tool.

use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, GrayImage, ImageFormat};
use log::info;
use std::{
    io::{Cursor, Write},
    path::PathBuf,
    process::{Command, Stdio},
};

use crate::common::OCR_BINARIZE_THRESHOLD;

use super::image::binarize;

pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, image: &DynamicImage, language: Option<&str>, psm: u8)
    -> Result<String>;
}

/// Grayscale, denoise with a 3x3 median and binarize.
pub fn prepare_for_ocr(image: &DynamicImage) -> GrayImage {
    let denoised = imageproc::filter::median_filter(&image.to_luma8(), 1, 1);
    binarize(&denoised, OCR_BINARIZE_THRESHOLD as f64)
}

#[derive(Debug, Clone)]
pub struct Tesseract {
    binary: PathBuf,
}

impl Tesseract {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, language: Option<&str>, psm: u8) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["stdin", "stdout"]);
        if let Some(language) = language {
            cmd.args(["-l", language]);
        }
        cmd.args(["--psm", &psm.to_string()]);
        cmd
    }
}

impl Default for Tesseract {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl TextExtractor for Tesseract {
    fn extract_text(
        &self,
        image: &DynamicImage,
        language: Option<&str>,
        psm: u8,
    ) -> Result<String> {
        let mut png = Vec::new();
        DynamicImage::ImageLuma8(prepare_for_ocr(image))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .context("failed to encode image for tesseract")?;

        let mut child = self
            .command(language, psm)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context(format!("failed to spawn {:?}", self.binary))?;

        child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("tesseract stdin is not piped"))?
            .write_all(&png)
            .context("failed to write image to tesseract")?;

        let output = child
            .wait_with_output()
            .context("failed to wait for tesseract")?;
        if !output.status.success() {
            return Err(anyhow!(
                "tesseract failed with exit code {}: {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Check that the tesseract binary runs and log its version.
pub fn check_tesseract(tesseract: &Tesseract) -> Result<()> {
    match Command::new(&tesseract.binary).arg("--version").output() {
        Ok(output) if output.status.success() => {
            // Older releases print the version on stderr.
            let version_info = if output.stdout.is_empty() {
                String::from_utf8_lossy(&output.stderr).into_owned()
            } else {
                String::from_utf8_lossy(&output.stdout).into_owned()
            };
            let version_number = version_info
                .lines()
                .next()
                .unwrap_or("Unknown version")
                .split_whitespace()
                .nth(1)
                .unwrap_or("Unknown");
            info!("tesseract version: {}", version_number);
            Ok(())
        }
        Ok(_) => Err(anyhow!(
            "`{:?}` was found, but it returned an error. Please ensure it's correctly installed.",
            tesseract.binary
        )),
        Err(err) => Err(anyhow!(err).context(format!(
            "`{:?}` is not installed or not available in PATH",
            tesseract.binary
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, RgbImage};

    #[test]
    fn preparation_yields_binary_gray() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(8, 8, |x, _| {
            image::Rgb([(x * 30) as u8, (x * 30) as u8, (x * 30) as u8])
        }));
        let prepared = prepare_for_ocr(&image);
        assert_eq!(prepared.dimensions(), (8, 8));
        assert!(prepared.pixels().all(|p| *p == Luma([0]) || *p == Luma([255])));
    }

    #[test]
    fn command_line_includes_options() {
        let tesseract = Tesseract::default();
        let cmd = tesseract.command(Some("deu"), 6);
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["stdin", "stdout", "-l", "deu", "--psm", "6"]);
        let cmd = tesseract.command(None, 3);
        assert_eq!(cmd.get_args().count(), 4);
    }

    #[test]
    fn missing_binary_is_an_error() {
        let tesseract = Tesseract::new("/nonexistent/tesseract-binary");
        let image = DynamicImage::new_luma8(4, 4);
        assert!(tesseract.extract_text(&image, None, 3).is_err());
        let err = check_tesseract(&tesseract).unwrap_err();
        assert!(err.to_string().contains("not installed"));
    }
}
