//! Locating the daemon executable.

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// File name of the daemon executable.
pub const DAEMON_NAME: &str = "intcoind";

/// Environment variable that overrides daemon discovery.
pub const DAEMON_ENV_VAR: &str = "INTCOIND";

/// Build-output directories searched, relative to the working directory and
/// each of its ancestors.
pub const BUILD_OUTPUT_DIRS: &[&str] = &["build/bin", "build", "build/src"];

/// Locates the daemon binary.
///
/// Resolution order: `explicit`, then `$INTCOIND`, then the conventional
/// build-output directories of the working directory and its ancestors, then
/// `PATH`.
///
/// # Errors
///
/// Returns [`Error::BinaryNotFound`] listing every checked location.
pub fn discover_daemon(explicit: Option<&Path>) -> Result<PathBuf> {
    let from_env = env::var_os(DAEMON_ENV_VAR).map(PathBuf::from);
    let cwd = env::current_dir().map_err(|e| Error::Io("failed to read working directory", e))?;

    discover_from(explicit, from_env.as_deref(), &cwd)
}

fn discover_from(explicit: Option<&Path>, from_env: Option<&Path>, start: &Path) -> Result<PathBuf> {
    // An explicit choice is never second-guessed.
    if let Some(path) = explicit.or(from_env) {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(Error::BinaryNotFound {
                searched: vec![path.to_path_buf()],
            })
        };
    }

    let mut searched = Vec::new();

    for dir in start.ancestors() {
        for build_dir in BUILD_OUTPUT_DIRS {
            let candidate = dir.join(build_dir).join(DAEMON_NAME);
            if candidate.is_file() {
                debug!(path = %candidate.display(), "found intcoind in build output");
                return Ok(candidate);
            }
            searched.push(candidate);
        }
    }

    if let Ok(path) = which::which(DAEMON_NAME) {
        debug!(path = %path.display(), "found intcoind on PATH");
        return Ok(path);
    }
    searched.push(PathBuf::from(format!("$PATH/{DAEMON_NAME}")));

    Err(Error::BinaryNotFound { searched })
}
