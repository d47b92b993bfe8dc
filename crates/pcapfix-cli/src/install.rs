//! # pcapfix install / uninstall
//!
//! Edits the preload list. The loader reads it on every process start, so
//! entries are validated before being written.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use console::style;
use pcapfix_config::preload::PreloadList;
use pcapfix_config::{log_cli_warn, log_preload_info, PreloadConfig, DEFAULT_PRELOAD_LIST};

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Added,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UninstallOutcome {
    Removed,
    NotPresent,
}

pub fn cmd_install(preload: &PreloadConfig, force: bool) -> Result<()> {
    warn_if_unprivileged(&preload.list_path);

    let list_path = preload.list_path.display();
    match install(preload, force)? {
        InstallOutcome::Added => eprintln!(
            "{} Added {} to {}",
            style("✔").green(),
            preload.library_path.display(),
            list_path
        ),
        InstallOutcome::AlreadyPresent => eprintln!(
            "{} {} is already listed in {}",
            style("●").dim(),
            preload.library_path.display(),
            list_path
        ),
    }
    Ok(())
}

pub fn cmd_uninstall(preload: &PreloadConfig) -> Result<()> {
    warn_if_unprivileged(&preload.list_path);

    let list_path = preload.list_path.display();
    match uninstall(preload)? {
        UninstallOutcome::Removed => eprintln!(
            "{} Removed {} from {}",
            style("✔").green(),
            preload.library_path.display(),
            list_path
        ),
        UninstallOutcome::NotPresent => eprintln!(
            "{} {} is not listed in {}",
            style("●").dim(),
            preload.library_path.display(),
            list_path
        ),
    }
    Ok(())
}

pub fn install(preload: &PreloadConfig, force: bool) -> Result<InstallOutcome> {
    install_at(preload, force, &std::env::current_dir()?)
}

/// [`install`] with relative library paths resolved against `cwd`.
pub fn install_at(preload: &PreloadConfig, force: bool, cwd: &Path) -> Result<InstallOutcome> {
    let entry = library_entry(&preload.library_path, force, cwd)?;

    let mut list = PreloadList::load(&preload.list_path)?;
    if !list.add(&entry) {
        return Ok(InstallOutcome::AlreadyPresent);
    }
    list.store(&preload.list_path)?;

    let list_path = preload.list_path.display().to_string();
    log_preload_info!(
        "Entry added",
        entry = entry.as_str(),
        list = list_path.as_str()
    );
    Ok(InstallOutcome::Added)
}

pub fn uninstall(preload: &PreloadConfig) -> Result<UninstallOutcome> {
    uninstall_at(preload, &std::env::current_dir()?)
}

/// [`uninstall`] with relative library paths resolved against `cwd`.
pub fn uninstall_at(preload: &PreloadConfig, cwd: &Path) -> Result<UninstallOutcome> {
    let mut list = PreloadList::load(&preload.list_path)?;

    let mut changed = false;
    for candidate in entry_candidates(&preload.library_path, cwd) {
        changed |= list.remove(&candidate);
    }
    if !changed {
        return Ok(UninstallOutcome::NotPresent);
    }
    list.store(&preload.list_path)?;

    let list_path = preload.list_path.display().to_string();
    log_preload_info!("Entry removed", list = list_path.as_str());
    Ok(UninstallOutcome::Removed)
}

/// Every spelling of `library` that may appear in the preload list: as
/// given, the absolute form `install` writes, and the symlink-resolved form
/// when the file still exists.
pub fn entry_candidates(library: &Path, cwd: &Path) -> Vec<String> {
    let mut out = Vec::new();
    let spellings = [
        Some(library.to_path_buf()),
        Some(absolute_path(library, cwd)),
        absolute_path(library, cwd).canonicalize().ok(),
    ];
    for s in spellings.into_iter().flatten() {
        if let Some(s) = s.to_str() {
            if !out.iter().any(|o| o == s) {
                out.push(s.to_owned());
            }
        }
    }
    out
}

/// Make `library` absolute against `cwd` without following symlinks, so the
/// entry keeps the name the user installed.
pub fn absolute_path(library: &Path, cwd: &Path) -> PathBuf {
    // components() drops interior `.` and repeated separators.
    cwd.join(library).components().collect()
}

/// Turn `library` into the absolute path written to the preload list.
fn library_entry(library: &Path, force: bool, cwd: &Path) -> Result<String> {
    let path = absolute_path(library, cwd);
    if !force {
        check_shared_object(&path)?;
    }

    let entry = match path.to_str() {
        Some(s) => s.to_owned(),
        None => bail!("library path is not valid UTF-8: {}", path.display()),
    };
    // The loader splits the list on whitespace and ':'.
    if entry.contains(|c: char| c.is_whitespace() || c == ':') {
        bail!("library path cannot contain whitespace or ':': {}", entry);
    }
    Ok(entry)
}

fn check_shared_object(library: &Path) -> Result<()> {
    let mut file = std::fs::File::open(library)
        .with_context(|| format!("library not found: {}", library.display()))?;
    if !file.metadata()?.is_file() {
        bail!("not a regular file: {}", library.display());
    }

    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_err() || &magic != ELF_MAGIC {
        bail!(
            "{} is not an ELF shared object (use --force to skip this check)",
            library.display()
        );
    }
    Ok(())
}

fn warn_if_unprivileged(list_path: &Path) {
    if list_path == Path::new(DEFAULT_PRELOAD_LIST) && !nix::unistd::Uid::effective().is_root() {
        log_cli_warn!("Not running as root; writing /etc/ld.so.preload will likely fail");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PreloadConfig) {
        let dir = TempDir::new().unwrap();
        let library = dir.path().join("libpcapfix.so");
        std::fs::write(&library, b"\x7fELF\x02\x01\x01\0rest").unwrap();
        let preload = PreloadConfig {
            list_path: dir.path().join("ld.so.preload"),
            library_path: library.canonicalize().unwrap(),
        };
        (dir, preload)
    }

    fn listed(preload: &PreloadConfig) -> Vec<String> {
        PreloadList::load(&preload.list_path)
            .unwrap()
            .entries()
            .to_vec()
    }

    #[test]
    fn test_install_adds_once() {
        let (_dir, preload) = setup();
        let entry = preload.library_path.to_str().unwrap().to_owned();

        assert_eq!(install(&preload, false).unwrap(), InstallOutcome::Added);
        assert_eq!(
            install(&preload, false).unwrap(),
            InstallOutcome::AlreadyPresent
        );
        assert_eq!(listed(&preload), vec![entry]);
    }

    #[test]
    fn test_install_keeps_existing_entries() {
        let (_dir, preload) = setup();
        std::fs::write(&preload.list_path, "/usr/lib/libother.so\n").unwrap();

        install(&preload, false).unwrap();

        let entries = listed(&preload);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], "/usr/lib/libother.so");
    }

    #[test]
    fn test_install_rejects_missing_library() {
        let (dir, mut preload) = setup();
        preload.library_path = dir.path().join("missing.so");

        let err = install(&preload, false).unwrap_err();
        assert!(err.to_string().contains("library not found"));
        assert!(!preload.list_path.exists());
    }

    #[test]
    fn test_install_rejects_non_elf() {
        let (dir, mut preload) = setup();
        let script = dir.path().join("libfake.so");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        preload.library_path = script;

        let err = install(&preload, false).unwrap_err();
        assert!(err.to_string().contains("not an ELF"));
    }

    #[test]
    fn test_force_skips_checks() {
        let (dir, mut preload) = setup();
        preload.library_path = dir.path().join("later.so");

        assert_eq!(install(&preload, true).unwrap(), InstallOutcome::Added);
        assert!(listed(&preload)[0].ends_with("later.so"));
    }

    #[test]
    fn test_force_rejects_separator_in_path() {
        let (dir, mut preload) = setup();
        preload.library_path = dir.path().join("lib pcapfix.so");

        let err = install(&preload, true).unwrap_err();
        assert!(err.to_string().contains("whitespace"));
    }

    #[test]
    fn test_uninstall_removes_entry() {
        let (_dir, preload) = setup();
        std::fs::write(
            &preload.list_path,
            format!("/usr/lib/libother.so\n{}\n", preload.library_path.display()),
        )
        .unwrap();

        assert_eq!(uninstall(&preload).unwrap(), UninstallOutcome::Removed);
        assert_eq!(listed(&preload), vec!["/usr/lib/libother.so".to_string()]);
        assert_eq!(uninstall(&preload).unwrap(), UninstallOutcome::NotPresent);
    }

    #[test]
    fn test_relative_forced_entry_is_uninstallable() {
        let (dir, mut preload) = setup();
        preload.library_path = PathBuf::from("build/./libpcapfix.so");

        assert_eq!(
            install_at(&preload, true, dir.path()).unwrap(),
            InstallOutcome::Added
        );
        let expected = dir.path().join("build").join("libpcapfix.so");
        assert_eq!(listed(&preload), vec![expected.to_str().unwrap().to_owned()]);

        // The library was never built, so nothing can be canonicalized.
        assert_eq!(
            uninstall_at(&preload, dir.path()).unwrap(),
            UninstallOutcome::Removed
        );
        assert!(listed(&preload).is_empty());
    }

    #[test]
    fn test_symlinked_library_keeps_link_name() {
        let (dir, mut preload) = setup();
        let target = dir.path().join("libpcapfix.so.0.1");
        std::fs::write(&target, b"\x7fELF\x02\x01\x01\0").unwrap();
        let link = dir.path().join("libpcapfix.so.0");
        std::os::unix::fs::symlink(&target, &link).unwrap();
        preload.library_path = link.clone();

        install_at(&preload, false, dir.path()).unwrap();
        assert_eq!(listed(&preload), vec![link.to_str().unwrap().to_owned()]);

        // A dangling link must still be removable.
        std::fs::remove_file(&target).unwrap();
        assert_eq!(
            uninstall_at(&preload, dir.path()).unwrap(),
            UninstallOutcome::Removed
        );
        assert!(listed(&preload).is_empty());
    }

    #[test]
    fn test_uninstall_matches_resolved_spelling() {
        let (dir, mut preload) = setup();
        let link = dir.path().join("libpcapfix-current.so");
        std::os::unix::fs::symlink(&preload.library_path, &link).unwrap();
        // Entry written by hand using the link target
        std::fs::write(
            &preload.list_path,
            format!("{}\n", preload.library_path.display()),
        )
        .unwrap();
        preload.library_path = link;

        assert_eq!(
            uninstall_at(&preload, dir.path()).unwrap(),
            UninstallOutcome::Removed
        );
    }

    #[test]
    fn test_absolute_path_is_lexical() {
        let cwd = Path::new("/srv/app");
        assert_eq!(
            absolute_path(Path::new("./lib//libpcapfix.so"), cwd),
            PathBuf::from("/srv/app/lib/libpcapfix.so")
        );
        assert_eq!(
            absolute_path(Path::new("/usr/local/lib/libpcapfix.so"), cwd),
            PathBuf::from("/usr/local/lib/libpcapfix.so")
        );
    }

    #[test]
    fn test_uninstall_without_list_file() {
        let (_dir, preload) = setup();
        assert_eq!(uninstall(&preload).unwrap(), UninstallOutcome::NotPresent);
        assert!(!preload.list_path.exists());
    }
}
