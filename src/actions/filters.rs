use crate::{
    common::{
        DEFAULT_PSM, MAX_PSM, PRIORITY_DECODE, PRIORITY_FILE, PRIORITY_OCR,
        errors::{ActionError, ActionResult},
    },
    grammar::{Bounds, Fields, Pattern, PatternKind, parse_number, parse_size},
    item::{Item, OcrKey},
};

use super::ActionContext;

/// OCR parameters and the pattern the extracted text must match.
#[derive(Debug, Clone, PartialEq)]
pub struct TextQuery {
    pub pattern: Pattern,
    pub language: Option<String>,
    pub psm: u8,
}

impl TextQuery {
    fn key(&self) -> OcrKey {
        OcrKey {
            language: self.language.clone(),
            psm: self.psm,
        }
    }

    /// Globs see the text with whitespace runs collapsed, regexes the raw
    /// text.
    fn matches(&self, text: &str) -> bool {
        match self.pattern.kind() {
            PatternKind::Glob => {
                let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
                self.pattern.is_match(&flat)
            }
            PatternKind::Regex => self.pattern.is_match(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterKind {
    Width(Bounds<u32>),
    Height(Bounds<u32>),
    AspectRatio(Bounds<f64>),
    Size(Bounds<u64>),
    Filename(Pattern),
    Text(TextQuery),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterAction {
    pub kind: FilterKind,
    pub invert: bool,
}

impl FilterAction {
    pub fn new(kind: FilterKind) -> Self {
        Self {
            kind,
            invert: false,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.invert = !self.invert;
        self
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            FilterKind::Width(_) => "Width",
            FilterKind::Height(_) => "Height",
            FilterKind::AspectRatio(_) => "AspectRatio",
            FilterKind::Size(_) => "Size",
            FilterKind::Filename(_) => "Filename",
            FilterKind::Text(_) => "Text",
        }
    }

    /// Lower runs first. File-system checks come before anything that
    /// decodes the image, and decoding before OCR.
    pub fn priority(&self) -> i32 {
        match self.kind {
            FilterKind::Size(_) | FilterKind::Filename(_) => PRIORITY_FILE,
            FilterKind::Width(_) | FilterKind::Height(_) | FilterKind::AspectRatio(_) => {
                PRIORITY_DECODE
            }
            FilterKind::Text(_) => PRIORITY_OCR,
        }
    }

    pub fn passes(&self, item: &mut Item, ctx: &ActionContext) -> ActionResult<bool> {
        Ok(self.evaluate(item, ctx)? != self.invert)
    }

    fn evaluate(&self, item: &mut Item, ctx: &ActionContext) -> ActionResult<bool> {
        match &self.kind {
            FilterKind::Width(bounds) => {
                if bounds.is_unbounded() {
                    return Ok(true);
                }
                Ok(bounds.contains_half_open(item.data()?.width()))
            }
            FilterKind::Height(bounds) => {
                if bounds.is_unbounded() {
                    return Ok(true);
                }
                Ok(bounds.contains_half_open(item.data()?.height()))
            }
            FilterKind::AspectRatio(bounds) => {
                if bounds.is_unbounded() {
                    return Ok(true);
                }
                let image = item.data()?;
                let ratio = image.width() as f64 / image.height() as f64;
                Ok(bounds.contains_open(ratio))
            }
            FilterKind::Size(bounds) => {
                if bounds.is_unbounded() {
                    return Ok(true);
                }
                Ok(bounds.contains_half_open(item.file_size()?))
            }
            FilterKind::Filename(pattern) => Ok(pattern.is_match_path(item.path())),
            FilterKind::Text(query) => {
                let key = query.key();
                if let Some(text) = item.extra().text_content(&key) {
                    return Ok(query.matches(text));
                }
                let path = item.path().to_path_buf();
                let text = ctx
                    .text_extractor
                    .extract_text(item.data()?, query.language.as_deref(), query.psm)
                    .map_err(|source| ActionError::Extract { path, source })?;
                let matched = query.matches(&text);
                item.extra_mut().set_text_content(key, text);
                Ok(matched)
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────
// Parsing
// ────────────────────────────────────────────────────────────────

fn int_bound<T: std::str::FromStr>(raw: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| format!("{:?}: {}", raw, e))
}

fn ratio_bound(raw: &str) -> Result<f64, String> {
    // Ratios may also be written as `16/9`.
    let value = match raw.split_once('/') {
        Some((w, h)) => {
            let w: f64 = w.trim().parse().map_err(|_| format!("{:?} is not a ratio", raw))?;
            let h: f64 = h.trim().parse().map_err(|_| format!("{:?} is not a ratio", raw))?;
            if h == 0.0 {
                return Err(format!("{:?} divides by zero", raw));
            }
            w / h
        }
        None => raw
            .parse::<f64>()
            .map_err(|_| format!("{:?} is not a ratio", raw))?,
    };
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{:?} is not a positive ratio", raw));
    }
    Ok(value)
}

pub(crate) fn parse_width(token: &str, value: Option<&str>) -> ActionResult<FilterKind> {
    Ok(FilterKind::Width(Bounds::parse(token, value, int_bound)?))
}

pub(crate) fn parse_height(token: &str, value: Option<&str>) -> ActionResult<FilterKind> {
    Ok(FilterKind::Height(Bounds::parse(token, value, int_bound)?))
}

pub(crate) fn parse_aspect_ratio(token: &str, value: Option<&str>) -> ActionResult<FilterKind> {
    Ok(FilterKind::AspectRatio(Bounds::parse(
        token,
        value,
        ratio_bound,
    )?))
}

pub(crate) fn parse_size_filter(token: &str, value: Option<&str>) -> ActionResult<FilterKind> {
    Ok(FilterKind::Size(Bounds::parse(token, value, parse_size)?))
}

/// `pattern[|glob|regex]`
pub(crate) fn parse_filename(token: &str, value: Option<&str>) -> ActionResult<FilterKind> {
    let fields = Fields::new(token, value.unwrap_or(""));
    fields.expect_at_most(2)?;
    let literal = fields.req_str(0, "pattern")?;
    let kind = Pattern::kind_from_field(token, fields.get(1))?;
    Ok(FilterKind::Filename(Pattern::new(token, literal, kind)?))
}

/// `pattern[|glob|regex][|language][|psm]`
pub(crate) fn parse_text(token: &str, value: Option<&str>) -> ActionResult<FilterKind> {
    let fields = Fields::new(token, value.unwrap_or(""));
    fields.expect_at_most(4)?;
    let literal = fields.req_str(0, "pattern")?;
    let kind = Pattern::kind_from_field(token, fields.get(1))?;
    let language = fields.get(2).map(str::to_string);
    let psm = match fields.get(3) {
        Some(raw) => parse_number::<u8>(token, "psm", raw)?,
        None => DEFAULT_PSM,
    };
    if psm > MAX_PSM {
        return Err(fields.domain_error(format!(
            "page segmentation mode must be within 0..={}, got {}",
            MAX_PSM, psm
        )));
    }
    Ok(FilterKind::Text(TextQuery {
        pattern: Pattern::new(token, literal, kind)?,
        language,
        psm,
    }))
}
