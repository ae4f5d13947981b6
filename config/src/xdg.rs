//! The XDG config file: `$XDG_CONFIG_HOME/<app>/config.toml` (falling back to the platform
//! config dir), with an `[env]` table and a `[session]` table.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::settings::SessionSettings;
use crate::LoadError;

/// Parsed `config.toml`. Both tables are optional.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub session: SessionSettings,
}

/// Where `config.toml` for `app_name` lives, whether or not it exists.
pub fn config_path(app_name: &str) -> Result<PathBuf, LoadError> {
    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::config_dir()
            .ok_or_else(|| LoadError::XdgPath("no config directory for this platform".into()))?,
    };
    Ok(base.join(app_name).join("config.toml"))
}

/// Loads the config file for `app_name`; a missing file is an empty config.
pub fn load(app_name: &str) -> Result<ConfigFile, LoadError> {
    let path = config_path(app_name)?;
    if !path.is_file() {
        return Ok(ConfigFile::default());
    }
    let content = std::fs::read_to_string(&path).map_err(|e| LoadError::XdgRead(path.clone(), e))?;
    Ok(toml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_env_and_session_tables() {
        let file: ConfigFile = toml::from_str(
            r#"
[env]
OLLAMA_HOST = "http://127.0.0.1:11434"

[session]
turns = 4
depth = 3
model = "llama3"
"#,
        )
        .unwrap();
        assert_eq!(file.env.get("OLLAMA_HOST").map(String::as_str), Some("http://127.0.0.1:11434"));
        assert_eq!(file.session.turns, Some(4));
        assert_eq!(file.session.depth, Some(3));
        assert_eq!(file.session.model.as_deref(), Some("llama3"));
        assert_eq!(file.session.breadth, None);
    }

    #[test]
    fn empty_file_is_default() {
        let file: ConfigFile = toml::from_str("").unwrap();
        assert!(file.env.is_empty());
        assert_eq!(file.session, SessionSettings::default());
    }

    #[test]
    fn unknown_session_key_is_rejected() {
        let r: Result<ConfigFile, _> = toml::from_str("[session]\nturnz = 3\n");
        assert!(r.is_err());
    }
}
