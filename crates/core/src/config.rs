use crate::commands::WarmupSettings;
use anyhow::{Context, Result};
use bastion_permissions::ResolverSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use toml_edit::{value, DocumentMut};

trait ConfigSerializeDefault {
    fn fix_config(self, name: &str, doc: &mut DocumentMut);
}

macro_rules! impl_simple_default {
    ( $( $type:ty ),* ) => {
        $(
            impl ConfigSerializeDefault for $type {
                fn fix_config(self, name: &str, doc: &mut DocumentMut) {
                    doc.entry(name).or_insert_with(|| value(self));
                }
            }
        )*
    }
}

impl_simple_default!(String, i64, bool);

macro_rules! gen_config {
    (
        $( $name:ident: $type:ty = $default:expr ),* $(,)?
    ) => {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct CoreConfig {
            $(
                pub $name: $type,
            )*
        }

        impl Default for CoreConfig {
            fn default() -> Self {
                CoreConfig {
                    $(
                        $name: $default,
                    )*
                }
            }
        }

        impl CoreConfig {
            /// Reads `config_file`, adding any missing keys with their defaults.
            /// The file is only rewritten when something was added.
            pub fn load(config_file: impl AsRef<Path>) -> Result<CoreConfig> {
                let path = config_file.as_ref();
                let str = match fs::read_to_string(path) {
                    Ok(str) => str,
                    Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
                    Err(err) => {
                        return Err(err)
                            .with_context(|| format!("failed to read {}", path.display()))
                    }
                };
                let mut doc = str
                    .parse::<DocumentMut>()
                    .with_context(|| format!("failed to parse {}", path.display()))?;

                $(
                    <$type as ConfigSerializeDefault>::fix_config($default, stringify!($name), &mut doc);
                )*

                let patched = doc.to_string();
                if str != patched {
                    fs::write(path, &patched)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                }

                toml::from_str(&patched)
                    .with_context(|| format!("invalid configuration in {}", path.display()))
            }
        }
    };
}

gen_config! {
    commands_file: String = "commands.toml".to_string(),
    permission_namespace: String = "bastion".to_string(),
    use_suggested_levels: bool = true,
    console_override: bool = false,
    warmup_cancel_on_move: bool = true,
    warmup_cancel_on_command: bool = true,
}

impl CoreConfig {
    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            use_suggested_levels: self.use_suggested_levels,
            console_override: self.console_override,
        }
    }

    pub fn warmup_settings(&self) -> WarmupSettings {
        WarmupSettings {
            cancel_on_move: self.warmup_cancel_on_move,
            cancel_on_command: self.warmup_cancel_on_command,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Config.toml");

        let config = CoreConfig::load(&path).unwrap();
        assert_eq!(config, CoreConfig::default());

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("commands_file = \"commands.toml\""));
        assert!(written.contains("warmup_cancel_on_move = true"));
    }

    #[test]
    fn operator_edits_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Config.toml");
        fs::write(
            &path,
            "# keep me\nconsole_override = true\npermission_namespace = \"admin\"\n",
        )
        .unwrap();

        let config = CoreConfig::load(&path).unwrap();
        assert!(config.console_override);
        assert_eq!(config.permission_namespace, "admin");
        assert!(config.use_suggested_levels);

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# keep me\nconsole_override = true\n"));
        assert!(written.contains("use_suggested_levels = true"));

        // a second load has nothing left to add
        CoreConfig::load(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), written);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Config.toml");
        fs::write(&path, "console_override = = true").unwrap();
        assert!(CoreConfig::load(&path).is_err());
    }
}
