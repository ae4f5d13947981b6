//! Configuration for the rehearsal CLI.
//!
//! Two sources feed the process environment, with priority **existing env > `.env` > XDG
//! `[env]`**: a project `.env` and `$XDG_CONFIG_HOME/rehearsal/config.toml`. The same
//! `config.toml` may carry a `[session]` table of debate settings, returned to the caller
//! to be layered under command-line flags.

mod dotenv_file;
mod settings;
mod xdg;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use settings::SessionSettings;
pub use xdg::{config_path, ConfigFile};

/// Application name used for the XDG directory.
pub const APP_NAME: &str = "rehearsal";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("xdg config path: {0}")]
    XdgPath(String),
    #[error("read {0}: {1}")]
    XdgRead(PathBuf, std::io::Error),
    #[error("parse xdg toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("read {0}: {1}")]
    Dotenv(PathBuf, String),
}

/// Applies `.env` and XDG `[env]` to the process environment for keys not already set, and
/// returns the XDG `[session]` settings.
///
/// * `app_name`: directory under the XDG config home, usually [`APP_NAME`].
/// * `dotenv_dir`: where to look for `.env`; the current directory when `None`.
pub fn load_and_apply(app_name: &str, dotenv_dir: Option<&Path>) -> Result<SessionSettings, LoadError> {
    let file = xdg::load(app_name)?;
    let dotenv = dotenv_file::load_env_map(dotenv_dir)?;

    let keys: BTreeSet<&String> = file.env.keys().chain(dotenv.keys()).collect();
    for key in keys {
        if std::env::var_os(key).is_some() {
            continue;
        }
        if let Some(value) = dotenv.get(key).or_else(|| file.env.get(key)) {
            std::env::set_var(key, value);
        }
    }
    Ok(file.session)
}
