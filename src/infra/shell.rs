//! Locating external executables.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Overrides the `gh` lookup, mostly for wrappers and tests.
pub const GH_PATH_ENV: &str = "PRESTO_GH_PATH";

/// Path of the GitHub CLI, honouring [`GH_PATH_ENV`].
pub fn gh_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(GH_PATH_ENV).filter(|p| !p.is_empty()) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Some(path);
        }
        log::warn!("{GH_PATH_ENV}={} is not a file, searching PATH", path.display());
    }
    find_bin("gh")
}

pub fn find_bin(command: &str) -> Option<PathBuf> {
    let path = Path::new(command);
    if path.components().count() > 1 && path.is_file() {
        return Some(path.to_path_buf());
    }

    let candidate_names = candidate_names(command);
    for dir in collect_search_paths() {
        for name in &candidate_names {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }

    None
}

fn collect_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(env_path) = std::env::var_os("PATH") {
        push_unique_paths(&mut paths, std::env::split_paths(&env_path));
    }

    // `gh` is commonly installed by Homebrew, which GUI-launched shells miss.
    push_unique_paths(&mut paths, default_search_paths());
    paths
}

fn default_search_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/opt/homebrew/bin"),
            PathBuf::from("/usr/local/bin"),
            PathBuf::from("/usr/bin"),
        ]
    }
    #[cfg(target_os = "linux")]
    {
        vec![
            PathBuf::from("/usr/local/bin"),
            PathBuf::from("/usr/bin"),
            PathBuf::from("/home/linuxbrew/.linuxbrew/bin"),
        ]
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        Vec::new()
    }
}

fn candidate_names(command: &str) -> Vec<OsString> {
    #[cfg(target_os = "windows")]
    {
        let mut names = vec![OsString::from(command)];
        if Path::new(command).extension().is_none() {
            let exts =
                std::env::var("PATHEXT").unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string());
            names.extend(
                exts.split(';')
                    .map(str::trim)
                    .filter(|ext| !ext.is_empty())
                    .map(|ext| OsString::from(format!("{command}{ext}"))),
            );
        }
        names
    }
    #[cfg(not(target_os = "windows"))]
    {
        vec![OsString::from(command)]
    }
}

fn push_unique_paths<I>(dest: &mut Vec<PathBuf>, paths: I)
where
    I: IntoIterator<Item = PathBuf>,
{
    for path in paths {
        if !dest.contains(&path) {
            dest.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_none() {
        assert!(find_bin("presto_missing_binary_12345").is_none());
    }

    #[test]
    fn explicit_path_is_returned_as_is() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        assert_eq!(find_bin(path.to_str().unwrap()), Some(path));
    }

    #[test]
    fn search_paths_are_deduplicated() {
        let mut dest = vec![PathBuf::from("/a")];
        push_unique_paths(&mut dest, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(dest, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
    }
}
