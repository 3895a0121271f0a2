//! Expansion of command line inputs (files, directories and glob
//! patterns) into the list of image paths to process.

use anyhow::{Context, Result, bail};
use globset::{GlobBuilder, GlobMatcher};
use log::{debug, warn};
use path_clean::PathClean;
use std::{
    collections::HashSet,
    path::{Component, Path, PathBuf},
};
use walkdir::WalkDir;

use super::PathExt;
use crate::common::VALID_IMAGE_EXTENSIONS;

#[derive(Debug, Clone)]
pub struct Collector {
    extensions: Vec<String>,
    recursive: bool,
}

impl Default for Collector {
    fn default() -> Self {
        Self {
            extensions: VALID_IMAGE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            recursive: true,
        }
    }
}

impl Collector {
    /// Restrict directory and glob expansion to these extensions.
    ///
    /// An empty list keeps the default image extensions.
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions: Vec<String> = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        if !extensions.is_empty() {
            self.extensions = extensions;
        }
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    fn accepts(&self, path: &Path) -> bool {
        let ext = path.ext_lower();
        self.extensions.iter().any(|e| *e == ext)
    }

    /// Expand every input, keeping first-seen order and dropping duplicates.
    ///
    /// Explicit files are taken as given. Directories and glob patterns only
    /// yield files with an accepted extension. A path that does not exist and
    /// is not a glob pattern is an error.
    pub fn collect<P: AsRef<Path>>(&self, inputs: &[P]) -> Result<Vec<PathBuf>> {
        let mut seen = HashSet::new();
        let mut paths = Vec::new();
        let mut push = |path: PathBuf| {
            let path = path.clean();
            if seen.insert(path.clone()) {
                paths.push(path);
            }
        };

        for input in inputs {
            let input = input.as_ref();
            if input.is_file() {
                push(input.to_path_buf());
            } else if input.is_dir() {
                for path in self.walk(input, None) {
                    push(path);
                }
            } else if is_glob(input) {
                let matcher = compile_glob(input)?;
                let mut matched = 0usize;
                for path in self.walk(&glob_base(input), Some(&matcher)) {
                    matched += 1;
                    push(path);
                }
                if matched == 0 {
                    warn!("Pattern {:?} matched no files", input);
                }
            } else {
                bail!("input path does not exist: {:?}", input);
            }
        }
        debug!("Collected {} input files", paths.len());
        Ok(paths)
    }

    fn walk(&self, root: &Path, matcher: Option<&GlobMatcher>) -> Vec<PathBuf> {
        let mut walker = WalkDir::new(root).follow_links(true).sort_by_file_name();
        if !self.recursive && matcher.is_none() {
            walker = walker.max_depth(1);
        }
        walker
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Skipping unreadable entry: {}", err);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| self.accepts(path))
            .filter(|path| matcher.is_none_or(|m| m.is_match(path.clean())))
            .collect()
    }
}

/// Expand inputs with the default image extensions.
pub fn collect_paths<P: AsRef<Path>>(inputs: &[P]) -> Result<Vec<PathBuf>> {
    Collector::default().collect(inputs)
}

fn has_glob_chars(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

fn is_glob(path: &Path) -> bool {
    has_glob_chars(&path.to_string_lossy())
}

/// Longest leading run of components without glob syntax.
fn glob_base(pattern: &Path) -> PathBuf {
    let mut base = PathBuf::new();
    for component in pattern.components() {
        if let Component::Normal(part) = component
            && has_glob_chars(&part.to_string_lossy())
        {
            break;
        }
        base.push(component);
    }
    if base.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        base
    }
}

fn compile_glob(pattern: &Path) -> Result<GlobMatcher> {
    let cleaned = pattern.to_path_buf().clean();
    let glob = GlobBuilder::new(&cleaned.to_string_lossy())
        .literal_separator(true)
        .build()
        .context(format!("invalid glob pattern {:?}", pattern))?;
    Ok(glob.compile_matcher())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn directories_are_walked_for_images() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.png"));
        touch(&dir.path().join("a.JPG"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("nested/c.webp"));

        let paths = collect_paths(&[dir.path()]).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.JPG", "b.png", "c.webp"]);

        let flat = Collector::default().recursive(false).collect(&[dir.path()]).unwrap();
        assert_eq!(flat.len(), 2);
    }

    #[test]
    fn explicit_files_bypass_the_extension_filter() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("scan.dat");
        touch(&file);
        let paths = collect_paths(&[&file]).unwrap();
        assert_eq!(paths, vec![file]);
    }

    #[test]
    fn custom_extensions() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.png"));
        touch(&dir.path().join("b.jpg"));
        let paths = Collector::default()
            .extensions([".PNG"])
            .collect(&[dir.path()])
            .unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].ends_with("a.png"));
    }

    #[test]
    fn glob_patterns_expand() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("x/one.png"));
        touch(&dir.path().join("x/two.jpg"));
        touch(&dir.path().join("y/three.png"));

        let pattern = dir.path().join("*/*.png");
        let paths = collect_paths(&[pattern]).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.ext_lower() == "png"));
    }

    #[test]
    fn duplicates_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.png");
        touch(&file);
        let paths = collect_paths(&[file.clone(), dir.path().to_path_buf()]).unwrap();
        assert_eq!(paths, vec![file]);
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_paths(&[dir.path().join("missing.png")]).is_err());
    }

    #[test]
    fn base_of_glob() {
        assert_eq!(glob_base(Path::new("a/b/*.png")), PathBuf::from("a/b"));
        assert_eq!(glob_base(Path::new("*.png")), PathBuf::from("."));
    }
}
