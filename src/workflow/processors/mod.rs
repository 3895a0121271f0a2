//! Image-level processing used by the actions.
//!
//! - `image`: decoding, encoding and pixel operations
//! - `ocr`: text extraction
//! - `setup`: logger

pub mod image;
pub mod ocr;
pub mod setup;
