use std::{fmt, path::Path};

use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;

use crate::common::errors::{ActionError, ActionResult};

const REGEX_ONLY_CHARS: &[char] = &['^', '$', '+', '(', ')', '{', '}', '\\', '|'];
const REGEX_ONLY_SEQUENCES: &[&str] = &[".*", ".+", ".?"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Glob,
    Regex,
}

impl PatternKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "glob" => Some(Self::Glob),
            "regex" | "re" => Some(Self::Regex),
            _ => None,
        }
    }

    /// Guess the kind of a pattern that did not state one.
    pub fn infer(literal: &str) -> Self {
        if literal.contains(REGEX_ONLY_CHARS) {
            return Self::Regex;
        }
        // A `*` not following a `.` only makes sense as a glob wildcard.
        let glob_star = literal
            .char_indices()
            .any(|(i, c)| c == '*' && !literal[..i].ends_with('.'));
        if !glob_star && REGEX_ONLY_SEQUENCES.iter().any(|s| literal.contains(s)) {
            Self::Regex
        } else {
            Self::Glob
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Glob => write!(f, "glob"),
            Self::Regex => write!(f, "regex"),
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Glob(GlobMatcher),
    Regex(Regex),
}

/// A compiled glob or regex pattern.
///
/// Globs match a whole string, regexes search for a match anywhere.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    kind: PatternKind,
    matcher: Matcher,
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.kind == other.kind
    }
}

impl Pattern {
    pub fn new(token: &str, literal: &str, kind: Option<PatternKind>) -> ActionResult<Self> {
        if literal.is_empty() {
            return Err(ActionError::parse(token, "pattern must not be empty"));
        }
        let kind = kind.unwrap_or_else(|| PatternKind::infer(literal));
        let matcher = match kind {
            PatternKind::Glob => GlobBuilder::new(literal)
                .literal_separator(false)
                .build()
                .map(|glob| Matcher::Glob(glob.compile_matcher()))
                .map_err(|e| ActionError::parse(token, format!("invalid glob: {}", e)))?,
            PatternKind::Regex => Regex::new(literal)
                .map(Matcher::Regex)
                .map_err(|e| ActionError::parse(token, format!("invalid regex: {}", e)))?,
        };
        Ok(Self {
            source: literal.to_string(),
            kind,
            matcher,
        })
    }

    /// Parse an explicit mode name, empty meaning "infer".
    pub fn kind_from_field(token: &str, field: Option<&str>) -> ActionResult<Option<PatternKind>> {
        match field {
            None => Ok(None),
            Some(name) => PatternKind::from_name(name).map(Some).ok_or_else(|| {
                ActionError::domain(
                    token,
                    format!("unknown pattern type {:?}, expected glob or regex", name),
                )
            }),
        }
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn is_match(&self, text: &str) -> bool {
        match &self.matcher {
            Matcher::Glob(glob) => glob.is_match(text),
            Matcher::Regex(regex) => regex.is_match(text),
        }
    }

    /// Globs are tried against the full path and the file name, regexes
    /// search the full path.
    pub fn is_match_path(&self, path: &Path) -> bool {
        match &self.matcher {
            Matcher::Glob(glob) => {
                glob.is_match(path)
                    || path
                        .file_name()
                        .is_some_and(|name| glob.is_match(Path::new(name)))
            }
            Matcher::Regex(regex) => regex.is_match(&path.to_string_lossy()),
        }
    }
}
