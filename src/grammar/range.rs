use crate::common::{
    PAIR_SEP,
    errors::{ActionError, ActionResult},
};

use super::split_unescaped;

/// Optional lower and upper bound of a range filter. A missing side is
/// unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds<T> {
    pub low: Option<T>,
    pub high: Option<T>,
}

impl<T: PartialOrd + Copy> Bounds<T> {
    pub fn new(low: Option<T>, high: Option<T>) -> Self {
        Self { low, high }
    }

    pub fn unbounded() -> Self {
        Self {
            low: None,
            high: None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.low.is_none() && self.high.is_none()
    }

    /// `low <= value < high`.
    pub fn contains_half_open(&self, value: T) -> bool {
        self.low.is_none_or(|low| low <= value) && self.high.is_none_or(|high| value < high)
    }

    /// `low < value < high`.
    pub fn contains_open(&self, value: T) -> bool {
        self.low.is_none_or(|low| low < value) && self.high.is_none_or(|high| value < high)
    }

    /// Parse `low,high` where either side may be left empty. A single value
    /// without a comma is a lower bound.
    pub fn parse(
        token: &str,
        raw: Option<&str>,
        bound: impl Fn(&str) -> Result<T, String>,
    ) -> ActionResult<Self> {
        let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
            return Ok(Self::unbounded());
        };
        let parse_side = |side: &str, name: &str| -> ActionResult<Option<T>> {
            if side.is_empty() {
                return Ok(None);
            }
            bound(side)
                .map(Some)
                .map_err(|e| ActionError::parse(token, format!("field `{}`: {}", name, e)))
        };
        let bounds = match split_unescaped(raw, PAIR_SEP).as_slice() {
            [low] => Self::new(parse_side(low, "low")?, None),
            [low, high] => Self::new(parse_side(low, "low")?, parse_side(high, "high")?),
            _ => {
                return Err(ActionError::parse(
                    token,
                    format!("a range is `low{}high`, got {:?}", PAIR_SEP, raw),
                ));
            }
        };
        if let (Some(low), Some(high)) = (bounds.low, bounds.high)
            && high < low
        {
            return Err(ActionError::domain(token, "upper bound is below lower bound"));
        }
        Ok(bounds)
    }
}
