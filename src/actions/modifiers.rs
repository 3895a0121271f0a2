use std::path::{Path, PathBuf};

use log::debug;

use crate::{
    common::{
        MAX_DIMENSION, MAX_PIXELS,
        errors::{ActionError, ActionResult},
    },
    grammar::{Fields, parse_pair},
    item::Item,
    utils::move_into_dir,
    workflow::processors::image::{
        Enhancement, NamedKernel, apply_kernel, crop_padded, enhance, median_blur, resize_exact,
        rotate_expand, rotated_extent, save_dynamic_image, threshold_autocontrast,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl CropBox {
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipDirection {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertMode {
    L,
    La,
    Rgb,
    Rgba,
}

impl ConvertMode {
    pub const NAMES: [&'static str; 4] = ["L", "LA", "RGB", "RGBA"];

    pub fn from_name(name: &str) -> Option<Self> {
        let mut upper = name.trim().to_ascii_uppercase();
        if upper == "GRAYSCALE" {
            upper = "L".to_string();
        }
        match upper.as_str() {
            "L" => Some(Self::L),
            "LA" => Some(Self::La),
            "RGB" => Some(Self::Rgb),
            "RGBA" => Some(Self::Rgba),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModifierAction {
    Resize {
        width: Option<u32>,
        height: Option<u32>,
    },
    Crop(CropBox),
    Rotate(f64),
    Scale {
        x: f64,
        y: f64,
    },
    Filter(NamedKernel),
    Flip(FlipDirection),
    Convert(ConvertMode),
    Invert,
    Threshold(f64),
    Contrast(f32),
    Brightness(f32),
    Sharpness(f32),
    Saturation(f32),
    MedianBlur(u32),
    GaussianBlur(f32),
    Move(PathBuf),
    Save(PathBuf),
}

impl ModifierAction {
    pub fn name(&self) -> &'static str {
        match self {
            ModifierAction::Resize { .. } => "Resize",
            ModifierAction::Crop(_) => "Crop",
            ModifierAction::Rotate(_) => "Rotate",
            ModifierAction::Scale { .. } => "Scale",
            ModifierAction::Filter(_) => "Filter",
            ModifierAction::Flip(_) => "Flip",
            ModifierAction::Convert(_) => "Convert",
            ModifierAction::Invert => "Invert",
            ModifierAction::Threshold(_) => "Threshold",
            ModifierAction::Contrast(_) => "Contrast",
            ModifierAction::Brightness(_) => "Brightness",
            ModifierAction::Sharpness(_) => "Sharpness",
            ModifierAction::Saturation(_) => "Saturation",
            ModifierAction::MedianBlur(_) => "MedianBlur",
            ModifierAction::GaussianBlur(_) => "GaussianBlur",
            ModifierAction::Move(_) => "Move",
            ModifierAction::Save(_) => "Save",
        }
    }

    /// Checked once per run, before any item is processed.
    pub fn validate(&self) -> ActionResult<()> {
        match self {
            ModifierAction::Move(directory) | ModifierAction::Save(directory) => {
                if directory.is_dir() {
                    Ok(())
                } else {
                    Err(ActionError::Precondition {
                        action: self.name(),
                        path: directory.clone(),
                    })
                }
            }
            _ => Ok(()),
        }
    }

    pub fn apply(&self, item: &mut Item) -> ActionResult<()> {
        let transformed = match self {
            ModifierAction::Resize { width, height } => {
                let image = item.data()?;
                let target = (
                    width.unwrap_or(image.width()),
                    height.unwrap_or(image.height()),
                );
                if target == (image.width(), image.height()) {
                    return Ok(());
                }
                let (width, height) = self.checked_size(target.0 as u64, target.1 as u64)?;
                resize_exact(image, width, height)
            }
            ModifierAction::Crop(b) => {
                let (width, height) = self.checked_size(b.width() as u64, b.height() as u64)?;
                crop_padded(item.data()?, b.x1, b.y1, width, height)
            }
            ModifierAction::Rotate(angle) => {
                let image = item.data()?;
                let (width, height) = rotated_extent(image.width(), image.height(), *angle);
                self.checked_size(width, height)?;
                rotate_expand(image, *angle)
            }
            ModifierAction::Scale { x, y } => {
                let image = item.data()?;
                let width = (image.width() as f64 * x) as u64;
                let height = (image.height() as f64 * y) as u64;
                let (width, height) = self.checked_size(width, height)?;
                resize_exact(image, width, height)
            }
            ModifierAction::Filter(kernel) => apply_kernel(item.data()?, *kernel),
            ModifierAction::Flip(FlipDirection::Horizontal) => item.data()?.fliph(),
            ModifierAction::Flip(FlipDirection::Vertical) => item.data()?.flipv(),
            ModifierAction::Convert(mode) => {
                let image = item.data()?;
                match mode {
                    ConvertMode::L => image.to_luma8().into(),
                    ConvertMode::La => image.to_luma_alpha8().into(),
                    ConvertMode::Rgb => image.to_rgb8().into(),
                    ConvertMode::Rgba => image.to_rgba8().into(),
                }
            }
            ModifierAction::Invert => {
                let mut image = item.data()?.clone();
                image.invert();
                image
            }
            ModifierAction::Threshold(threshold) => {
                threshold_autocontrast(item.data()?, *threshold)
            }
            ModifierAction::Contrast(factor) => {
                enhance(item.data()?, Enhancement::Contrast, *factor)
            }
            ModifierAction::Brightness(factor) => {
                enhance(item.data()?, Enhancement::Brightness, *factor)
            }
            ModifierAction::Sharpness(factor) => {
                enhance(item.data()?, Enhancement::Sharpness, *factor)
            }
            ModifierAction::Saturation(factor) => {
                enhance(item.data()?, Enhancement::Color, *factor)
            }
            ModifierAction::MedianBlur(radius) => median_blur(item.data()?, *radius),
            ModifierAction::GaussianBlur(radius) => item.data()?.blur(*radius),
            ModifierAction::Move(directory) => return move_item(item, directory),
            ModifierAction::Save(directory) => return save_item(item, directory),
        };
        item.replace(transformed)
    }

    /// Refuse results larger than the raster backend can allocate.
    fn checked_size(&self, width: u64, height: u64) -> ActionResult<(u32, u32)> {
        let too_large = width > MAX_DIMENSION as u64
            || height > MAX_DIMENSION as u64
            || width.saturating_mul(height) > MAX_PIXELS;
        if too_large {
            return Err(ActionError::TooLarge {
                action: self.name(),
                width,
                height,
            });
        }
        Ok((width as u32, height as u32))
    }
}

fn move_item(item: &mut Item, directory: &Path) -> ActionResult<()> {
    let target = move_into_dir(item.path(), directory).map_err(|source| ActionError::Io {
        path: item.path().to_path_buf(),
        source,
    })?;
    debug!("Moved {:?} to {:?}", item.path(), target);
    item.set_path(target);
    Ok(())
}

fn save_item(item: &mut Item, directory: &Path) -> ActionResult<()> {
    let file_name = item
        .path()
        .file_name()
        .ok_or_else(|| ActionError::NotFound(item.path().to_path_buf()))?;
    let target = directory.join(file_name);
    save_dynamic_image(item.data()?, &target)
        .map_err(|source| ActionError::Write {
            path: target.clone(),
            source,
        })?;
    debug!("Saved {:?}", target);
    Ok(())
}

// ────────────────────────────────────────────────────────────────
// Parsing
// ────────────────────────────────────────────────────────────────

fn single_field<'a>(token: &'a str, value: Option<&str>) -> ActionResult<Fields<'a>> {
    let fields = Fields::new(token, value.unwrap_or(""));
    fields.expect_at_most(1)?;
    Ok(fields)
}

fn factor(token: &str, value: Option<&str>) -> ActionResult<f32> {
    let factor: f32 = single_field(token, value)?.parse_req(0, "factor")?;
    if !factor.is_finite() {
        return Err(ActionError::domain(token, "factor must be a finite number"));
    }
    Ok(factor)
}

/// `[width][|height]`, either may be left out.
pub(crate) fn parse_resize(token: &str, value: Option<&str>) -> ActionResult<ModifierAction> {
    let fields = Fields::new(token, value.unwrap_or(""));
    fields.expect_at_most(2)?;
    let width = fields.parse_opt::<u32>(0, "width")?;
    let height = fields.parse_opt::<u32>(1, "height")?;
    if width == Some(0) || height == Some(0) {
        return Err(fields.domain_error("width and height must be positive"));
    }
    if width.max(height) > Some(MAX_DIMENSION) {
        return Err(fields.domain_error(format!(
            "width and height must not exceed {}",
            MAX_DIMENSION
        )));
    }
    Ok(ModifierAction::Resize { width, height })
}

/// `x1,y1|x2,y2`
pub(crate) fn parse_crop(token: &str, value: Option<&str>) -> ActionResult<ModifierAction> {
    let fields = Fields::new(token, value.unwrap_or(""));
    if fields.count() != 2 {
        return Err(fields.error("expected two corners `x1,y1|x2,y2`"));
    }
    let (x1, y1) = parse_pair::<u32>(token, "x1,y1", fields.req_str(0, "x1,y1")?)?;
    let (x2, y2) = parse_pair::<u32>(token, "x2,y2", fields.req_str(1, "x2,y2")?)?;
    if x2 <= x1 || y2 <= y1 {
        return Err(fields.domain_error("the second corner must lie right of and below the first"));
    }
    if x2 - x1 > MAX_DIMENSION || y2 - y1 > MAX_DIMENSION {
        return Err(fields.domain_error(format!(
            "the box must not exceed {} pixels on a side",
            MAX_DIMENSION
        )));
    }
    Ok(ModifierAction::Crop(CropBox { x1, y1, x2, y2 }))
}

pub(crate) fn parse_rotate(token: &str, value: Option<&str>) -> ActionResult<ModifierAction> {
    let angle: f64 = single_field(token, value)?.parse_req(0, "angle")?;
    if !angle.is_finite() {
        return Err(ActionError::domain(token, "angle must be a finite number"));
    }
    Ok(ModifierAction::Rotate(angle))
}

/// `factor` or `x|y`; a single factor on either side applies to both axes.
pub(crate) fn parse_scale(token: &str, value: Option<&str>) -> ActionResult<ModifierAction> {
    let fields = Fields::new(token, value.unwrap_or(""));
    fields.expect_at_most(2)?;
    let x = fields.parse_opt::<f64>(0, "x")?;
    let y = fields.parse_opt::<f64>(1, "y")?;
    let (x, y) = match (x, y) {
        (Some(x), Some(y)) => (x, y),
        (Some(f), None) | (None, Some(f)) => (f, f),
        (None, None) => return Err(fields.error("a scale factor is required")),
    };
    if !(x.is_finite() && y.is_finite() && x > 0.0 && y > 0.0) {
        return Err(fields.domain_error("scale factors must be positive"));
    }
    Ok(ModifierAction::Scale { x, y })
}

pub(crate) fn parse_filter(token: &str, value: Option<&str>) -> ActionResult<ModifierAction> {
    let fields = single_field(token, value)?;
    let name = fields.req_str(0, "filter")?;
    NamedKernel::from_name(name)
        .map(ModifierAction::Filter)
        .ok_or_else(|| {
            let valid: Vec<_> = NamedKernel::ALL.iter().map(|k| k.name()).collect();
            fields.domain_error(format!(
                "invalid filter {:?}, valid filters: {}",
                name,
                valid.join(", ")
            ))
        })
}

pub(crate) fn parse_flip(token: &str, value: Option<&str>) -> ActionResult<ModifierAction> {
    let fields = single_field(token, value)?;
    let direction = fields.req_str(0, "direction")?;
    match direction.to_ascii_lowercase().as_str() {
        "horizontal" | "h" => Ok(ModifierAction::Flip(FlipDirection::Horizontal)),
        "vertical" | "v" => Ok(ModifierAction::Flip(FlipDirection::Vertical)),
        other => Err(fields.domain_error(format!(
            "invalid direction {:?}, expected horizontal or vertical",
            other
        ))),
    }
}

pub(crate) fn parse_convert(token: &str, value: Option<&str>) -> ActionResult<ModifierAction> {
    let fields = single_field(token, value)?;
    let mode = fields.req_str(0, "mode")?;
    ConvertMode::from_name(mode)
        .map(ModifierAction::Convert)
        .ok_or_else(|| {
            fields.domain_error(format!(
                "invalid mode {:?}, valid modes: {}",
                mode,
                ConvertMode::NAMES.join(", ")
            ))
        })
}

pub(crate) fn parse_invert(token: &str, value: Option<&str>) -> ActionResult<ModifierAction> {
    if value.is_some_and(|v| !v.trim().is_empty()) {
        return Err(ActionError::parse(token, "Invert takes no value"));
    }
    Ok(ModifierAction::Invert)
}

pub(crate) fn parse_threshold(token: &str, value: Option<&str>) -> ActionResult<ModifierAction> {
    let threshold: f64 = single_field(token, value)?.parse_req(0, "threshold")?;
    if !threshold.is_finite() {
        return Err(ActionError::domain(token, "threshold must be a finite number"));
    }
    Ok(ModifierAction::Threshold(threshold))
}

pub(crate) fn parse_contrast(token: &str, value: Option<&str>) -> ActionResult<ModifierAction> {
    Ok(ModifierAction::Contrast(factor(token, value)?))
}

pub(crate) fn parse_brightness(token: &str, value: Option<&str>) -> ActionResult<ModifierAction> {
    Ok(ModifierAction::Brightness(factor(token, value)?))
}

pub(crate) fn parse_sharpness(token: &str, value: Option<&str>) -> ActionResult<ModifierAction> {
    Ok(ModifierAction::Sharpness(factor(token, value)?))
}

pub(crate) fn parse_saturation(token: &str, value: Option<&str>) -> ActionResult<ModifierAction> {
    Ok(ModifierAction::Saturation(factor(token, value)?))
}

pub(crate) fn parse_median_blur(token: &str, value: Option<&str>) -> ActionResult<ModifierAction> {
    let radius: u32 = single_field(token, value)?.parse_req(0, "radius")?;
    if radius > MAX_DIMENSION {
        return Err(ActionError::domain(
            token,
            format!("radius must not exceed {}", MAX_DIMENSION),
        ));
    }
    Ok(ModifierAction::MedianBlur(radius))
}

pub(crate) fn parse_gaussian_blur(
    token: &str,
    value: Option<&str>,
) -> ActionResult<ModifierAction> {
    let radius: f32 = single_field(token, value)?.parse_req(0, "radius")?;
    if !(radius == 0.0 || (radius.is_normal() && radius > 0.0)) {
        return Err(ActionError::domain(token, "radius must be zero or positive"));
    }
    if radius > MAX_DIMENSION as f32 {
        return Err(ActionError::domain(
            token,
            format!("radius must not exceed {}", MAX_DIMENSION),
        ));
    }
    Ok(ModifierAction::GaussianBlur(radius))
}

pub(crate) fn parse_move(token: &str, value: Option<&str>) -> ActionResult<ModifierAction> {
    let fields = single_field(token, value)?;
    Ok(ModifierAction::Move(PathBuf::from(fields.req_str(0, "directory")?)))
}

pub(crate) fn parse_save(token: &str, value: Option<&str>) -> ActionResult<ModifierAction> {
    let fields = single_field(token, value)?;
    Ok(ModifierAction::Save(PathBuf::from(fields.req_str(0, "directory")?)))
}
