/*
 * Created on Fri Sep 15 2023
 *
 * This file is a part of the Moat database client
 * The Moat client (moatsh) is a free and open-source interactive and batch
 * SQL client for remote "moat" database targets, with support for connection
 * profiles, bulk statement imports and usage accounting.
 *
 * Copyright (c) 2023, the moatsh authors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! Moat connection profiles
//!
//! Each profile is one `<moat>.json` file inside the configuration
//! directory, carrying everything needed to connect to that target.

use {
    crate::error::{CliError, CliResult},
    serde::{Deserialize, Serialize},
    std::{
        fs,
        path::{Path, PathBuf},
    },
};

pub const DEFAULT_CONFIG_DIR: &str = "./config";
const DEFAULT_PORT: u16 = 6642;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoatProfile {
    pub moat: String,
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub secret: String,
    pub private_key: serde_json::Value,
}

fn default_protocol() -> String {
    "tcp".to_owned()
}

impl MoatProfile {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

/// The profile store. Creating one ensures the backing directory exists.
pub struct ConfigDir {
    path: PathBuf,
}

impl ConfigDir {
    pub fn open(path: &str) -> CliResult<Self> {
        fs::create_dir_all(path).map_err(|e| {
            CliError::ConfigError(format!("failed to create config dir `{path}`. {e}"))
        })?;
        Ok(Self { path: path.into() })
    }
    fn profile_path(&self, moat: &str) -> PathBuf {
        self.path.join(format!("{moat}.json"))
    }
    pub fn exists(&self, moat: &str) -> bool {
        self.profile_path(moat).exists()
    }
    /// Names of all stored profiles, in directory order
    pub fn list(&self) -> CliResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_owned());
                }
            }
        }
        Ok(names)
    }
    pub fn load(&self, moat: &str) -> CliResult<MoatProfile> {
        let path = self.profile_path(moat);
        let raw = fs::read_to_string(&path).map_err(|e| {
            CliError::ConfigError(format!(
                "failed to read profile `{}`. {e}",
                path.display()
            ))
        })?;
        parse_profile(&path, &raw)
    }
    pub fn save(&self, profile: &MoatProfile) -> CliResult<()> {
        let path = self.profile_path(&profile.moat);
        let raw = serde_json::to_string_pretty(profile)
            .map_err(|e| CliError::ConfigError(format!("failed to encode profile. {e}")))?;
        fs::write(&path, raw).map_err(|e| {
            CliError::ConfigError(format!(
                "failed to write profile `{}`. {e}",
                path.display()
            ))
        })?;
        Ok(())
    }
}

fn parse_profile(path: &Path, raw: &str) -> CliResult<MoatProfile> {
    serde_json::from_str(raw).map_err(|e| {
        CliError::ConfigError(format!("bad profile `{}`. {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_profile, MoatProfile};
    use std::path::Path;

    #[test]
    fn profile_roundtrip() {
        let profile = MoatProfile {
            moat: "prod".to_owned(),
            host: "db.example.org".to_owned(),
            port: Some(7001),
            protocol: "tcp".to_owned(),
            secret: "hunter2".to_owned(),
            private_key: serde_json::json!({"kty": "EC"}),
        };
        let raw = serde_json::to_string(&profile).unwrap();
        let back = parse_profile(Path::new("prod.json"), &raw).unwrap();
        assert_eq!(back.moat, "prod");
        assert_eq!(back.port(), 7001);
    }

    #[test]
    fn missing_port_and_protocol_use_defaults() {
        let raw = r#"{
            "moat": "test",
            "host": "127.0.0.1",
            "secret": "s",
            "private_key": {}
        }"#;
        let profile = parse_profile(Path::new("test.json"), raw).unwrap();
        assert_eq!(profile.port(), super::DEFAULT_PORT);
        assert_eq!(profile.protocol, "tcp");
    }

    #[test]
    fn garbage_profile_is_a_config_error() {
        assert!(parse_profile(Path::new("x.json"), "{oops").is_err());
    }
}
