//! The dynamic loader's preload list (`/etc/ld.so.preload`).
//!
//! The loader splits the file on whitespace and `:`. Rendering normalizes to
//! one entry per line; entry order is preserved.

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

const SEPARATORS: &[char] = &[' ', '\t', '\n', '\r', ':'];
const LIST_MODE: u32 = 0o644;

#[derive(Debug, thiserror::Error)]
pub enum PreloadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadList {
    entries: Vec<String>,
}

impl PreloadList {
    pub fn parse(text: &str) -> Self {
        let entries = text
            .split(SEPARATORS)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        Self { entries }
    }

    /// Read the list at `path`. A missing file is an empty list.
    pub fn load(path: &Path) -> Result<Self, PreloadError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(PreloadError::Read {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Atomically replace the list at `path`.
    ///
    /// A half-written preload list breaks every new process on the host, so
    /// the content goes to a sibling temp file that is renamed into place.
    pub fn store(&self, path: &Path) -> Result<(), PreloadError> {
        let write_err = |source| PreloadError::Write {
            path: path.display().to_string(),
            source,
        };

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(self.render().as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(LIST_MODE))
            .map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        Ok(())
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.iter().any(|e| e == entry)
    }

    /// Append `entry` unless present. Returns whether the list changed.
    pub fn add(&mut self, entry: &str) -> bool {
        if self.contains(entry) {
            return false;
        }
        self.entries.push(entry.to_owned());
        true
    }

    /// Drop every occurrence of `entry`. Returns whether the list changed.
    pub fn remove(&mut self, entry: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e != entry);
        self.entries.len() != before
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(entry);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_separators() {
        let list = PreloadList::parse("/lib/a.so:/lib/b.so\n  /lib/c.so\t/lib/d.so\n\n");
        assert_eq!(
            list.entries(),
            &["/lib/a.so", "/lib/b.so", "/lib/c.so", "/lib/d.so"]
        );
    }

    #[test]
    fn test_parse_blank() {
        assert!(PreloadList::parse("").is_empty());
        assert!(PreloadList::parse(" \n:\n").is_empty());
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut list = PreloadList::parse("/lib/a.so");
        assert!(list.add("/lib/b.so"));
        assert!(!list.add("/lib/b.so"));
        assert_eq!(list.render(), "/lib/a.so\n/lib/b.so\n");
    }

    #[test]
    fn test_remove_all_occurrences() {
        let mut list = PreloadList::parse("/lib/x.so /lib/a.so /lib/x.so");
        assert!(list.remove("/lib/x.so"));
        assert!(!list.remove("/lib/x.so"));
        assert_eq!(list.entries(), &["/lib/a.so"]);
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(PreloadList::default().render(), "");
    }
}
