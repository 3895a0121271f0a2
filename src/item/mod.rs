//! One unit of work: a path and its lazily decoded image.

pub mod extra;

use std::{
    fmt,
    path::{Path, PathBuf},
};

use image::DynamicImage;
use log::{debug, warn};

use crate::{
    common::errors::{ActionError, ActionResult},
    workflow::processors::image::generate_dynamic_image_from_path,
};

pub use extra::{Extra, OcrKey};

/// Decodes the file behind an item.
pub type Loader = fn(&Path) -> anyhow::Result<DynamicImage>;

/// Lifecycle of an item's image. `Discarded` is terminal.
pub enum Resource {
    Unloaded,
    Loaded(DynamicImage),
    Discarded,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Unloaded => write!(f, "Unloaded"),
            Resource::Loaded(image) => {
                write!(f, "Loaded({}x{} {:?})", image.width(), image.height(), image.color())
            }
            Resource::Discarded => write!(f, "Discarded"),
        }
    }
}

pub struct Item {
    path: PathBuf,
    resource: Resource,
    extra: Extra,
    revision: u64,
    loader: Loader,
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("path", &self.path)
            .field("resource", &self.resource)
            .field("revision", &self.revision)
            .finish()
    }
}

impl Item {
    pub fn new(path: impl Into<PathBuf>) -> ActionResult<Self> {
        Self::with_loader(path, generate_dynamic_image_from_path)
    }

    pub fn with_loader(path: impl Into<PathBuf>, loader: Loader) -> ActionResult<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(ActionError::NotFound(path));
        }
        Ok(Self {
            path,
            resource: Resource::Unloaded,
            extra: Extra::default(),
            revision: 0,
            loader,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn set_path(&mut self, path: PathBuf) {
        self.path = path;
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.resource, Resource::Loaded(_))
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self.resource, Resource::Discarded)
    }

    /// Number of times the image has been replaced by a modifier.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn extra(&self) -> &Extra {
        &self.extra
    }

    pub fn extra_mut(&mut self) -> &mut Extra {
        &mut self.extra
    }

    /// Size of the file on disk; does not decode the image.
    pub fn file_size(&self) -> ActionResult<u64> {
        std::fs::metadata(&self.path)
            .map(|meta| meta.len())
            .map_err(|source| ActionError::Io {
                path: self.path.clone(),
                source,
            })
    }

    /// Decode the image unless it is already loaded.
    ///
    /// A failing decode discards the item; a discarded item is never loaded
    /// again.
    pub fn load(&mut self) -> ActionResult<()> {
        match self.resource {
            Resource::Loaded(_) => Ok(()),
            Resource::Discarded => Err(ActionError::Discarded(self.path.clone())),
            Resource::Unloaded => match (self.loader)(&self.path) {
                Ok(image) => {
                    debug!("Loaded {:?} ({}x{})", self.path, image.width(), image.height());
                    self.resource = Resource::Loaded(image);
                    Ok(())
                }
                Err(source) => {
                    warn!("Discarding {:?}: {:#}", self.path, source);
                    self.discard();
                    Err(ActionError::Load {
                        path: self.path.clone(),
                        source,
                    })
                }
            },
        }
    }

    pub fn unload(&mut self) {
        if let Resource::Loaded(_) = self.resource {
            self.resource = Resource::Unloaded;
        }
    }

    /// Release the image and take the item out of processing for good.
    pub fn discard(&mut self) {
        self.resource = Resource::Discarded;
        self.extra.clear();
    }

    /// The decoded image, loading it on first access.
    pub fn data(&mut self) -> ActionResult<&DynamicImage> {
        self.load()?;
        match &self.resource {
            Resource::Loaded(image) => Ok(image),
            _ => Err(ActionError::Discarded(self.path.clone())),
        }
    }

    /// Swap in a new image. Memoized values describe the old image and are
    /// dropped.
    pub fn replace(&mut self, image: DynamicImage) -> ActionResult<()> {
        if self.is_discarded() {
            return Err(ActionError::Discarded(self.path.clone()));
        }
        self.resource = Resource::Loaded(image);
        self.revision += 1;
        self.extra.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::extra::OcrKey;
    use image::{DynamicImage, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn touch(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"not really an image").unwrap();
        path
    }

    fn ok_loader(_: &Path) -> anyhow::Result<DynamicImage> {
        Ok(DynamicImage::ImageRgb8(RgbImage::new(4, 3)))
    }

    fn failing_loader(_: &Path) -> anyhow::Result<DynamicImage> {
        anyhow::bail!("corrupt")
    }

    static COUNTED_LOADS: AtomicUsize = AtomicUsize::new(0);

    fn counting_loader(path: &Path) -> anyhow::Result<DynamicImage> {
        COUNTED_LOADS.fetch_add(1, Ordering::SeqCst);
        ok_loader(path)
    }

    #[test]
    fn missing_path_is_not_found() {
        let err = Item::new("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, ActionError::NotFound(_)));
    }

    #[test]
    fn starts_unloaded_and_loads_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let mut item = Item::with_loader(touch(&dir, "a.png"), ok_loader).unwrap();
        assert!(!item.is_loaded());
        assert_eq!(item.data().unwrap().width(), 4);
        assert!(item.is_loaded());
    }

    #[test]
    fn load_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut item = Item::with_loader(touch(&dir, "a.png"), counting_loader).unwrap();
        item.load().unwrap();
        item.load().unwrap();
        item.data().unwrap();
        assert_eq!(COUNTED_LOADS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_load_discards() {
        let dir = tempfile::tempdir().unwrap();
        let mut item = Item::with_loader(touch(&dir, "a.png"), failing_loader).unwrap();
        let err = item.load().unwrap_err();
        assert!(matches!(err, ActionError::Load { .. }));
        assert!(item.is_discarded());
        assert!(!item.is_loaded());
        // Absorbing: no second attempt.
        assert!(matches!(item.load(), Err(ActionError::Discarded(_))));
    }

    #[test]
    fn unload_and_discard_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut item = Item::with_loader(touch(&dir, "a.png"), ok_loader).unwrap();
        item.load().unwrap();
        item.unload();
        item.unload();
        assert!(!item.is_loaded());
        item.discard();
        item.discard();
        assert!(item.is_discarded());
        assert!(!item.is_loaded());
    }

    #[test]
    fn unload_allows_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut item = Item::with_loader(touch(&dir, "a.png"), ok_loader).unwrap();
        item.load().unwrap();
        item.unload();
        assert!(item.data().is_ok());
    }

    #[test]
    fn replace_bumps_revision_and_clears_memo() {
        let dir = tempfile::tempdir().unwrap();
        let mut item = Item::with_loader(touch(&dir, "a.png"), ok_loader).unwrap();
        let key = OcrKey {
            language: None,
            psm: 3,
        };
        item.extra_mut().set_text_content(key.clone(), "hello".into());
        item.replace(DynamicImage::ImageRgb8(RgbImage::new(1, 1)))
            .unwrap();
        assert_eq!(item.revision(), 1);
        assert!(item.extra().text_content(&key).is_none());
        assert_eq!(item.data().unwrap().width(), 1);
    }

    #[test]
    fn replace_after_discard_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut item = Item::with_loader(touch(&dir, "a.png"), ok_loader).unwrap();
        item.discard();
        assert!(item.replace(DynamicImage::new_rgb8(1, 1)).is_err());
        assert!(item.is_discarded());
    }

    #[test]
    fn file_size_does_not_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut item = Item::with_loader(touch(&dir, "a.png"), failing_loader).unwrap();
        assert_eq!(item.file_size().unwrap(), 19);
        assert!(!item.is_discarded());
        assert!(item.load().is_err());
    }
}
