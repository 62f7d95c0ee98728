use std::collections::HashMap;
use std::path::PathBuf;

/// Output locations of the pages written in one run, keyed by class name.
///
/// Each page lives at `<dir>/<dir>/.../<Class>.md` relative to the output
/// root. Links between pages are relative paths using `/`.
#[derive(Debug, Clone, Default)]
pub struct LocalPages {
    dirs: HashMap<String, Vec<String>>,
}

impl LocalPages {
    /// Register a page under the given directory components.
    pub fn insert(&mut self, class: impl Into<String>, dirs: Vec<String>) {
        self.dirs.insert(class.into(), dirs);
    }

    /// Page path relative to the output root.
    pub fn relative_path(&self, class: &str) -> Option<PathBuf> {
        let dirs = self.dirs.get(class)?;
        let mut path: PathBuf = dirs.iter().collect();
        path.push(format!("{class}.md"));
        Some(path)
    }

    /// Relative link from the page of `from` to the page of `to`.
    pub fn link(&self, from: &str, to: &str) -> Option<String> {
        let from_dirs = self.dirs.get(from)?;
        let to_dirs = self.dirs.get(to)?;

        let common = from_dirs
            .iter()
            .zip(to_dirs)
            .take_while(|(a, b)| a == b)
            .count();

        let mut link = "../".repeat(from_dirs.len() - common);
        for dir in &to_dirs[common..] {
            link.push_str(dir);
            link.push('/');
        }
        link.push_str(to);
        link.push_str(".md");
        Some(link)
    }
}
