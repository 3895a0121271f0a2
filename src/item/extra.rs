use std::collections::HashMap;

/// Parameters that determine an OCR result for one image revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OcrKey {
    pub language: Option<String>,
    pub psm: u8,
}

/// Memoized values derived from an item's image.
///
/// Each kind of value gets its own typed slot; everything here describes the
/// current image and is dropped whenever the image is replaced.
#[derive(Debug, Default, Clone)]
pub struct Extra {
    text_content: HashMap<OcrKey, String>,
}

impl Extra {
    pub fn text_content(&self, key: &OcrKey) -> Option<&str> {
        self.text_content.get(key).map(String::as_str)
    }

    pub fn set_text_content(&mut self, key: OcrKey, text: String) {
        self.text_content.insert(key, text);
    }

    pub fn clear(&mut self) {
        self.text_content.clear();
    }
}
