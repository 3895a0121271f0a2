//! Filter and modifier actions and the registry that parses them from
//! `[!]name[:value]` tokens.

pub mod filters;
pub mod modifiers;

use std::{fmt, sync::Arc};

use crate::{
    common::{
        INVERT_PREFIX,
        errors::{ActionError, ActionResult},
    },
    workflow::processors::ocr::{Tesseract, TextExtractor},
};

pub use filters::{FilterAction, FilterKind, TextQuery};
pub use modifiers::{ConvertMode, CropBox, FlipDirection, ModifierAction};

/// Shared, read-only collaborators the actions call into.
#[derive(Clone)]
pub struct ActionContext {
    pub text_extractor: Arc<dyn TextExtractor>,
}

impl ActionContext {
    pub fn new(text_extractor: Arc<dyn TextExtractor>) -> Self {
        Self { text_extractor }
    }
}

impl Default for ActionContext {
    fn default() -> Self {
        Self::new(Arc::new(Tesseract::default()))
    }
}

impl fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Filter(FilterAction),
    Modifier(ModifierAction),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Filter(filter) => filter.name(),
            Action::Modifier(modifier) => modifier.name(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Filter,
    Modifier,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Filter => write!(f, "filter"),
            ActionKind::Modifier => write!(f, "modifier"),
        }
    }
}

type FilterParser = fn(&str, Option<&str>) -> ActionResult<FilterKind>;
type ModifierParser = fn(&str, Option<&str>) -> ActionResult<ModifierAction>;

#[derive(Clone, Copy)]
enum Parser {
    Filter(FilterParser),
    Modifier(ModifierParser),
}

/// One entry of the action registry.
#[derive(Clone, Copy)]
pub struct ActionSpec {
    pub name: &'static str,
    pub abbrev: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
    parser: Parser,
}

impl ActionSpec {
    pub fn kind(&self) -> ActionKind {
        match self.parser {
            Parser::Filter(_) => ActionKind::Filter,
            Parser::Modifier(_) => ActionKind::Modifier,
        }
    }

    fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.abbrev.eq_ignore_ascii_case(name)
    }
}

impl fmt::Debug for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSpec")
            .field("name", &self.name)
            .field("abbrev", &self.abbrev)
            .field("kind", &self.kind())
            .finish()
    }
}

macro_rules! filter {
    ($name:literal, $abbrev:literal, $usage:literal, $description:literal, $parser:path) => {
        ActionSpec {
            name: $name,
            abbrev: $abbrev,
            usage: $usage,
            description: $description,
            parser: Parser::Filter($parser),
        }
    };
}

macro_rules! modifier {
    ($name:literal, $abbrev:literal, $usage:literal, $description:literal, $parser:path) => {
        ActionSpec {
            name: $name,
            abbrev: $abbrev,
            usage: $usage,
            description: $description,
            parser: Parser::Modifier($parser),
        }
    };
}

pub static ACTIONS: &[ActionSpec] = &[
    filter!("Width", "w", "[low],[high]", "Filter by image width", filters::parse_width),
    filter!("Height", "h", "[low],[high]", "Filter by image height", filters::parse_height),
    filter!(
        "Size",
        "sz",
        "[low],[high]",
        "Filter by file size, e.g. 10KB,2MB",
        filters::parse_size_filter
    ),
    filter!(
        "AspectRatio",
        "ar",
        "[low],[high]",
        "Filter by aspect ratio (exclusive bounds), e.g. 1,16/9",
        filters::parse_aspect_ratio
    ),
    filter!(
        "Filename",
        "fn",
        "pattern[|glob|regex]",
        "Filter by file name using a glob or regex pattern",
        filters::parse_filename
    ),
    filter!(
        "Text",
        "txt",
        "pattern[|glob|regex][|language][|psm]",
        "Filter by text content extracted with OCR",
        filters::parse_text
    ),
    modifier!(
        "Resize",
        "rs",
        "[width][|height]",
        "Resize the image, a missing side keeps its size",
        modifiers::parse_resize
    ),
    modifier!(
        "Crop",
        "cr",
        "x1,y1|x2,y2",
        "Crop the image to the given box",
        modifiers::parse_crop
    ),
    modifier!(
        "Rotate",
        "rot",
        "angle",
        "Rotate counter-clockwise by the given degrees",
        modifiers::parse_rotate
    ),
    modifier!(
        "Scale",
        "sc",
        "factor | x|y",
        "Scale the image by the given factor(s)",
        modifiers::parse_scale
    ),
    modifier!(
        "Filter",
        "f",
        "name",
        "Apply a named filter: blur, contour, detail, edge_enhance, edge_enhance_more, emboss, find_edges, sharpen, smooth, smooth_more",
        modifiers::parse_filter
    ),
    modifier!(
        "Flip",
        "fl",
        "horizontal|vertical",
        "Flip the image",
        modifiers::parse_flip
    ),
    modifier!(
        "Convert",
        "cnv",
        "mode",
        "Convert to a color mode: L, LA, RGB, RGBA (GRAYSCALE = L)",
        modifiers::parse_convert
    ),
    modifier!("Invert", "inv", "", "Invert the colors", modifiers::parse_invert),
    modifier!(
        "Threshold",
        "thr",
        "threshold",
        "Binarize a grayscale copy at the threshold",
        modifiers::parse_threshold
    ),
    modifier!(
        "Contrast",
        "cont",
        "factor",
        "Adjust contrast, 1.0 keeps the original",
        modifiers::parse_contrast
    ),
    modifier!(
        "Brightness",
        "brgh",
        "factor",
        "Adjust brightness, 0.0 is black and 1.0 keeps the original",
        modifiers::parse_brightness
    ),
    modifier!(
        "Sharpness",
        "shrp",
        "factor",
        "Adjust sharpness, 0.0 blurs and 2.0 sharpens",
        modifiers::parse_sharpness
    ),
    modifier!(
        "Saturation",
        "sat",
        "factor",
        "Adjust color balance, 0.0 is black and white",
        modifiers::parse_saturation
    ),
    modifier!(
        "MedianBlur",
        "mb",
        "radius",
        "Median filter to reduce noise",
        modifiers::parse_median_blur
    ),
    modifier!(
        "GaussianBlur",
        "gb",
        "radius",
        "Gaussian blur to reduce noise",
        modifiers::parse_gaussian_blur
    ),
    modifier!(
        "Move",
        "m",
        "directory",
        "Move the file into an existing directory",
        modifiers::parse_move
    ),
    modifier!(
        "Save",
        "s",
        "directory",
        "Save the current image into an existing directory",
        modifiers::parse_save
    ),
];

/// Find an action by full name or abbreviation, ignoring case.
pub fn lookup(name: &str) -> Option<&'static ActionSpec> {
    ACTIONS.iter().find(|spec| spec.matches(name))
}

/// Parse one `[!]name[:value]` token.
pub fn parse_token(token: &str) -> ActionResult<Action> {
    let (head, value) = match token.split_once(':') {
        Some((head, value)) => (head.trim(), Some(value)),
        None => (token.trim(), None),
    };
    let (invert, name) = match head.strip_prefix(INVERT_PREFIX) {
        Some(name) => (true, name.trim()),
        None => (false, head),
    };
    if name.is_empty() {
        return Err(ActionError::parse(token, "missing action name"));
    }
    let spec = lookup(name)
        .ok_or_else(|| ActionError::parse(token, format!("unknown action {:?}", name)))?;

    match spec.parser {
        Parser::Filter(parse) => Ok(Action::Filter(FilterAction {
            kind: parse(token, value)?,
            invert,
        })),
        Parser::Modifier(parse) => {
            if invert {
                return Err(ActionError::parse(
                    token,
                    format!("{} is a modifier and cannot be inverted", spec.name),
                ));
            }
            Ok(Action::Modifier(parse(token, value)?))
        }
    }
}

/// Parse every token, stopping at the first error.
pub fn parse_actions<S: AsRef<str>>(tokens: &[S]) -> ActionResult<Vec<Action>> {
    tokens.iter().map(|t| parse_token(t.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Bounds;
    use std::collections::HashSet;

    #[test]
    fn names_and_abbrevs_are_unique() {
        let mut seen = HashSet::new();
        for spec in ACTIONS {
            assert!(seen.insert(spec.name.to_ascii_lowercase()), "{}", spec.name);
            assert!(seen.insert(spec.abbrev.to_ascii_lowercase()), "{}", spec.abbrev);
        }
    }

    #[test]
    fn lookup_by_name_or_abbrev() {
        assert_eq!(lookup("width").unwrap().name, "Width");
        assert_eq!(lookup("W").unwrap().name, "Width");
        assert_eq!(lookup("txt").unwrap().kind(), ActionKind::Filter);
        assert_eq!(lookup("s").unwrap().kind(), ActionKind::Modifier);
        assert!(lookup("nope").is_none());
    }

    #[test]
    fn token_without_value_uses_defaults() {
        assert_eq!(
            parse_token("w").unwrap(),
            Action::Filter(FilterAction::new(FilterKind::Width(Bounds::unbounded())))
        );
        assert_eq!(parse_token("inv").unwrap(), Action::Modifier(ModifierAction::Invert));
    }

    #[test]
    fn invert_prefix() {
        let Action::Filter(filter) = parse_token("!sz:1MB,").unwrap() else {
            panic!("expected a filter");
        };
        assert!(filter.invert);
        assert_eq!(filter.kind, FilterKind::Size(Bounds::new(Some(1 << 20), None)));
        assert!(parse_token("!rs:10|10").is_err());
    }

    #[test]
    fn value_may_contain_colons() {
        assert_eq!(
            parse_token(r"s:C:\out").unwrap(),
            Action::Modifier(ModifierAction::Save(r"C:\out".into()))
        );
    }

    #[test]
    fn crop_token() {
        assert_eq!(
            parse_token("cr:10,10|50,50").unwrap(),
            Action::Modifier(ModifierAction::Crop(CropBox {
                x1: 10,
                y1: 10,
                x2: 50,
                y2: 50
            }))
        );
    }

    #[test]
    fn errors_name_the_token() {
        let err = parse_token("bogus:1").unwrap_err();
        assert!(err.to_string().contains("bogus:1"));
        let err = parse_token("rs:abc").unwrap_err();
        assert!(err.to_string().contains("rs:abc"));
        assert!(parse_token("").is_err());
        assert!(parse_token("!").is_err());
    }

    #[test]
    fn parse_actions_keeps_order() {
        let actions = parse_actions(&["rs:10|", "w:5,", "s:/tmp"]).unwrap();
        let names: Vec<_> = actions.iter().map(Action::name).collect();
        assert_eq!(names, vec!["Resize", "Width", "Save"]);
        assert!(parse_actions(&["rs:10|", "cnv:cmyk"]).is_err());
    }
}
