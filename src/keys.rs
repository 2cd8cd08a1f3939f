//! SSH key material loading.
//!
//! A launch request carries three pieces of key material: the submitting
//! user's public key and the project owner's public and private keys. This
//! module centralises tilde expansion and file reading so the CLI handles
//! all three the same way.

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

/// Errors raised while loading key material.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum KeyMaterialError {
    /// Raised when a key path is empty or only whitespace.
    #[error("key file path must not be empty")]
    PathEmpty,
    /// Raised when a key file resolves to empty or only whitespace.
    #[error("key file `{path}` must not be empty")]
    FileEmpty {
        /// Expanded path of the empty file.
        path: String,
    },
    /// Raised when reading the key file fails.
    #[error("failed to read key file `{path}`: {message}")]
    FileRead {
        /// Expanded path that failed to read.
        path: String,
        /// Underlying error message.
        message: String,
    },
}

/// Loads key material from `path`, expanding a leading `~/`.
///
/// The returned content preserves the file verbatim; trimming is left to the
/// consumers that embed the key in commands.
///
/// # Errors
///
/// Returns [`KeyMaterialError`] when the path is blank, the file cannot be
/// read, or the file holds only whitespace.
pub fn load_key_material(path: &str) -> Result<String, KeyMaterialError> {
    if path.trim().is_empty() {
        return Err(KeyMaterialError::PathEmpty);
    }

    let expanded = expand_tilde(path);
    let content =
        read_to_string_ambient(&expanded).map_err(|message| KeyMaterialError::FileRead {
            path: expanded.clone(),
            message,
        })?;

    if content.trim().is_empty() {
        return Err(KeyMaterialError::FileEmpty { path: expanded });
    }

    Ok(content)
}

/// Expands a leading `~/` prefix to the user's home directory.
///
/// If the `HOME` environment variable is not set, the input string is
/// returned unchanged.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}

fn read_to_string_ambient(path: &str) -> Result<String, String> {
    let path_buf = Utf8Path::new(path);

    let (dir_path, file_path) = if path_buf.is_absolute() {
        let parent = path_buf
            .parent()
            .ok_or_else(|| format!("path has no parent directory: {path_buf}"))?;
        let file_name = path_buf
            .file_name()
            .ok_or_else(|| format!("path has no file name: {path_buf}"))?;
        (parent, Utf8Path::new(file_name))
    } else {
        (Utf8Path::new("."), path_buf)
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_path).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_key_and_preserves_content() {
        let dir = tempfile::tempdir().expect("temp dir");
        let key_path = dir.path().join("id_ed25519.pub");
        std::fs::write(&key_path, "ssh-ed25519 AAAA user@host\n").expect("write key");

        let content = load_key_material(key_path.to_str().expect("utf8 path"))
            .expect("key should load");
        assert_eq!(content, "ssh-ed25519 AAAA user@host\n");
    }

    #[test]
    fn rejects_a_blank_path() {
        let err = load_key_material("   ").expect_err("blank path should fail");
        assert_eq!(err, KeyMaterialError::PathEmpty);
    }

    #[test]
    fn rejects_an_empty_key_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let key_path = dir.path().join("empty.pub");
        std::fs::write(&key_path, "  \n").expect("write key");

        let err = load_key_material(key_path.to_str().expect("utf8 path"))
            .expect_err("empty file should fail");
        assert!(matches!(err, KeyMaterialError::FileEmpty { .. }));
    }

    #[test]
    fn surfaces_read_failures_with_the_path() {
        let err = load_key_material("/definitely/missing/key.pub")
            .expect_err("missing file should fail");
        let KeyMaterialError::FileRead { path, .. } = err else {
            panic!("expected FileRead, got {err:?}");
        };
        assert_eq!(path, "/definitely/missing/key.pub");
    }

    #[test]
    fn expands_a_leading_tilde() {
        if let Ok(home) = std::env::var("HOME") {
            assert_eq!(
                expand_tilde("~/.ssh/id_ed25519"),
                format!("{home}/.ssh/id_ed25519")
            );
        }
        assert_eq!(expand_tilde("/absolute/path"), "/absolute/path");
    }
}
