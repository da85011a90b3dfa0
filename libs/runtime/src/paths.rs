//! Home directory resolution.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HomeDirError {
    #[error("cannot determine the user home directory ({0} is not set)")]
    NoUserHome(&'static str),
    #[error("cannot determine the current directory: {0}")]
    CurrentDir(#[source] std::io::Error),
    #[error("failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(target_os = "windows")]
const HOME_VAR: &str = "APPDATA";
#[cfg(not(target_os = "windows"))]
const HOME_VAR: &str = "HOME";

fn user_home() -> Result<PathBuf, HomeDirError> {
    std::env::var_os(HOME_VAR)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .ok_or(HomeDirError::NoUserHome(HOME_VAR))
}

fn expand_tilde(path: &str) -> Result<PathBuf, HomeDirError> {
    if path == "~" {
        return user_home();
    }
    match path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        Some(rest) => Ok(user_home()?.join(rest)),
        None => Ok(PathBuf::from(path)),
    }
}

/// Absolute home directory of the server.
///
/// `configured` may start with `~` and may be relative to the current directory;
/// without it `<user home>/<default_subdir>` is used. With `create` the directory is made.
pub fn resolve_home_dir(
    configured: Option<String>,
    default_subdir: &str,
    create: bool,
) -> Result<PathBuf, HomeDirError> {
    let path = match configured.as_deref() {
        Some(dir) => expand_tilde(dir)?,
        None => user_home()?.join(default_subdir),
    };
    let path = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map_err(HomeDirError::CurrentDir)?
            .join(path)
    };
    if create {
        ensure_dir(&path)?;
    }
    Ok(path)
}

fn ensure_dir(path: &Path) -> Result<(), HomeDirError> {
    std::fs::create_dir_all(path).map_err(|source| HomeDirError::Create {
        path: path.to_path_buf(),
        source,
    })
}
