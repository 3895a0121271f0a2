//! Value grammar for action tokens.
//!
//! A token value is a list of `SEP`-delimited fields. Each field may be empty,
//! which stands for "use the default for this position". `\|` inside a field is
//! a literal separator. Nested fields (points, ranges) use `,`.

pub mod pattern;
pub mod range;
pub mod size;

use std::{fmt::Display, str::FromStr};

use crate::common::{
    PAIR_SEP, SEP,
    errors::{ActionError, ActionResult},
};

pub use pattern::{Pattern, PatternKind};
pub use range::Bounds;
pub use size::parse_size;

/// Split `value` on unescaped `sep`, trimming each field.
pub fn split_unescaped(value: &str, sep: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&sep) {
            current.push(sep);
            chars.next();
        } else if c == sep {
            fields.push(std::mem::take(&mut current).trim().to_string());
        } else {
            current.push(c);
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// The positional fields of one action value.
#[derive(Debug, Clone)]
pub struct Fields<'a> {
    token: &'a str,
    fields: Vec<String>,
}

impl<'a> Fields<'a> {
    /// `token` is the whole CLI token and only used for error messages.
    pub fn new(token: &'a str, value: &str) -> Self {
        Self {
            token,
            fields: split_unescaped(value, SEP),
        }
    }

    pub fn count(&self) -> usize {
        self.fields.len()
    }

    pub fn expect_at_most(&self, max: usize) -> ActionResult<()> {
        if self.fields.len() > max {
            return Err(self.error(format!(
                "expected at most {} field(s) separated by '{}', got {}",
                max,
                SEP,
                self.fields.len()
            )));
        }
        Ok(())
    }

    /// Field at `idx`, `None` when it is missing or empty.
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.fields
            .get(idx)
            .map(String::as_str)
            .filter(|f| !f.is_empty())
    }

    pub fn parse_opt<T>(&self, idx: usize, name: &str) -> ActionResult<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(idx)
            .map(|raw| parse_number(self.token, name, raw))
            .transpose()
    }

    pub fn parse_req<T>(&self, idx: usize, name: &str) -> ActionResult<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.parse_opt(idx, name)?
            .ok_or_else(|| self.error(format!("missing required field `{}`", name)))
    }

    pub fn req_str(&self, idx: usize, name: &str) -> ActionResult<&str> {
        self.get(idx)
            .ok_or_else(|| self.error(format!("missing required field `{}`", name)))
    }

    pub fn error(&self, reason: impl Into<String>) -> ActionError {
        ActionError::parse(self.token, reason)
    }

    pub fn domain_error(&self, reason: impl Into<String>) -> ActionError {
        ActionError::domain(self.token, reason)
    }
}

pub fn parse_number<T>(token: &str, name: &str, raw: &str) -> ActionResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse::<T>()
        .map_err(|e| ActionError::parse(token, format!("field `{}` = {:?}: {}", name, raw, e)))
}

/// Parse a nested `x,y` field.
pub fn parse_pair<T>(token: &str, name: &str, raw: &str) -> ActionResult<(T, T)>
where
    T: FromStr,
    T::Err: Display,
{
    match split_unescaped(raw, PAIR_SEP).as_slice() {
        [x, y] if !x.is_empty() && !y.is_empty() => Ok((
            parse_number(token, name, x)?,
            parse_number(token, name, y)?,
        )),
        _ => Err(ActionError::parse(
            token,
            format!("field `{}` must be a pair `x{}y`, got {:?}", name, PAIR_SEP, raw),
        )),
    }
}
