pub mod errors;

use rayon::{ThreadPool, ThreadPoolBuilder};

/// Field separator of the action value grammar.
pub const SEP: char = '|';

/// Separator inside a nested field (points, ranges).
pub const PAIR_SEP: char = ',';

/// Prefix on an action name that inverts a filter.
pub const INVERT_PREFIX: char = '!';

pub const PRIORITY_FILE: i32 = 1;
pub const PRIORITY_DECODE: i32 = 5;
pub const PRIORITY_OCR: i32 = 6;

/// Largest width or height a modifier may produce.
pub const MAX_DIMENSION: u32 = 1 << 16;

/// Largest pixel count a modifier may produce.
pub const MAX_PIXELS: u64 = 178_956_970;

/// Grayscale cut-off applied before text extraction.
pub const OCR_BINARIZE_THRESHOLD: u8 = 140;

pub const DEFAULT_PSM: u8 = 3;
pub const MAX_PSM: u8 = 13;

pub const VALID_IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "jfif", "jpe", "png", "tif", "tiff", "webp", "bmp", "gif", "ico", "tga", "pnm",
    "pbm", "pgm", "ppm", "qoi",
];

/// Build the worker pool used for per-item processing.
///
/// `None` lets rayon pick one thread per logical core.
pub fn build_worker_pool(threads: Option<usize>) -> anyhow::Result<ThreadPool> {
    let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("imgtk-worker-{}", i));
    if let Some(n) = threads.filter(|n| *n > 0) {
        builder = builder.num_threads(n);
    }
    Ok(builder.build()?)
}
