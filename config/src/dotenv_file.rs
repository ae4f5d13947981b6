//! Read a project `.env` into a map without touching the process environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::LoadError;

/// `.env` in `dir`, or in the current directory when `dir` is `None`.
fn dotenv_path(dir: Option<&Path>) -> Option<PathBuf> {
    let dir = match dir {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir().ok()?,
    };
    let path = dir.join(".env");
    path.is_file().then_some(path)
}

/// Key-value pairs of the `.env` file. A missing file yields an empty map.
pub fn load_env_map(dir: Option<&Path>) -> Result<HashMap<String, String>, LoadError> {
    let Some(path) = dotenv_path(dir) else {
        return Ok(HashMap::new());
    };
    let iter = dotenv::from_path_iter(&path)
        .map_err(|e| LoadError::Dotenv(path.clone(), e.to_string()))?;
    let mut out = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| LoadError::Dotenv(path.clone(), e.to_string()))?;
        out.insert(key, value);
    }
    Ok(out)
}
