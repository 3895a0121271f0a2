pub mod collect;

use std::{
    fs, io,
    path::{Path, PathBuf},
};

pub use collect::{Collector, collect_paths};

pub trait PathExt {
    fn ext_lower(&self) -> String;
}

impl PathExt for Path {
    fn ext_lower(&self) -> String {
        self.extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default()
    }
}

/// Move `source` into `directory`, keeping its file name.
///
/// Falls back to copy and remove when a rename crosses file systems.
/// Returns the new path.
pub fn move_into_dir(source: &Path, directory: &Path) -> io::Result<PathBuf> {
    let file_name = source.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{:?} has no file name", source),
        )
    })?;
    let target = directory.join(file_name);

    if let (Ok(from), Ok(to_dir)) = (fs::canonicalize(source), fs::canonicalize(directory))
        && from == to_dir.join(file_name)
    {
        return Ok(target);
    }

    match fs::rename(source, &target) {
        Ok(()) => Ok(target),
        Err(rename_err) => {
            fs::copy(source, &target).map_err(|_| rename_err)?;
            fs::remove_file(source)?;
            Ok(target)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ext_lower_normalizes_case() {
        assert_eq!(Path::new("a/B.JPG").ext_lower(), "jpg");
        assert_eq!(Path::new("noext").ext_lower(), "");
    }

    #[test]
    fn move_into_dir_relocates_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, b"x").unwrap();
        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();

        let target = move_into_dir(&source, &out).unwrap();
        assert_eq!(target, out.join("a.txt"));
        assert!(target.exists());
        assert!(!source.exists());
    }

    #[test]
    fn move_into_same_dir_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, b"x").unwrap();
        let target = move_into_dir(&source, dir.path()).unwrap();
        assert_eq!(target, source);
        assert!(source.exists());
    }

    #[test]
    fn move_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(move_into_dir(&dir.path().join("missing"), dir.path()).is_err());
    }
}
