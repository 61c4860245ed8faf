// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Helpers shared by the build scripts in this workspace.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::env;
use std::fs::File;
use std::path::PathBuf;

/// Environment variable carrying the app-wide TOML configuration.
pub const APP_CONFIG_VAR: &str = "HUBRIS_APP_CONFIG";

///
/// Pulls the app-wide configuration for purposes of a build task.  This
/// will fail if the app-wide configuration doesn't exist or can't parse.
/// Note that -- thanks to the magic of Serde -- `T` need not (and indeed,
/// should not) contain the entire app-wide configuration, but rather only
/// those parts that a particular build task cares about.  (It should go
/// without saying that `deny_unknown_fields` should *not* be set on this
/// type -- but it may well be set within the task-specific types that
/// this type contains.)
///
pub fn config<T: DeserializeOwned>() -> Result<T> {
    println!("cargo:rerun-if-env-changed={APP_CONFIG_VAR}");
    let text = env::var(APP_CONFIG_VAR)
        .with_context(|| format!("${APP_CONFIG_VAR} is not set"))?;
    parse_config(&text)
}

/// Equivalent to `config` but uses `T::default()` if the environment variable
/// is missing. If the environment variable fails to parse, this still fails
/// with `Err`.
pub fn config_or_default<T: DeserializeOwned + Default>() -> Result<T> {
    // We want to emit this whether or not the env var is present, so that we'll
    // be re-run if it becomes present.
    println!("cargo:rerun-if-env-changed={APP_CONFIG_VAR}");

    match env::var(APP_CONFIG_VAR) {
        Ok(text) => {
            println!("--- toml for ${APP_CONFIG_VAR} ---");
            println!("{text}");
            parse_config(&text)
        }
        Err(_) => {
            println!("--- var ${APP_CONFIG_VAR} not present, using default ---");
            Ok(T::default())
        }
    }
}

/// Parses a configuration fragment out of TOML text.
pub fn parse_config<T: DeserializeOwned>(text: &str) -> Result<T> {
    toml::from_str(text).context("parsing app config")
}

/// Creates (or truncates) a file for generated code in `$OUT_DIR`.
pub fn out_file(name: &str) -> Result<File> {
    let out_dir = env::var("OUT_DIR").context("$OUT_DIR is not set")?;
    let path = PathBuf::from(out_dir).join(name);
    File::create(&path)
        .with_context(|| format!("creating {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(rename_all = "kebab-case")]
    struct Global {
        #[serde(default)]
        widget: Option<Widget>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "kebab-case", deny_unknown_fields)]
    struct Widget {
        bus_name: String,
        address: u8,
    }

    #[test]
    fn parses_subset_of_global_config() {
        let text = r#"
            name = "some-app"

            [widget]
            bus-name = "i2c3"
            address = 0x50
        "#;
        let cfg: Global = parse_config(text).unwrap();
        assert_eq!(
            cfg.widget,
            Some(Widget {
                bus_name: "i2c3".to_string(),
                address: 0x50,
            })
        );
    }

    #[test]
    fn missing_section_is_none() {
        let cfg: Global = parse_config("name = \"some-app\"\n").unwrap();
        assert_eq!(cfg, Global::default());
    }

    #[test]
    fn unknown_fields_in_section_are_rejected() {
        let text = r#"
            [widget]
            bus-name = "i2c3"
            address = 0x50
            colour = "blue"
        "#;
        assert!(parse_config::<Global>(text).is_err());
    }
}
