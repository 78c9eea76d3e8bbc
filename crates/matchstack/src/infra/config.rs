//! Configuration management utilities.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::app::locate::DEFAULT_LABEL_OFFSET;
use crate::domain::model::{ColorChoice, ContextSize};
use crate::infra::highlight::DEFAULT_THEME;

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static USER_CONFIG_PATH: &str = "matchstack/config.toml";

/// Layered configuration loaded from defaults, user file, extra file, and env.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    pub toolchain: ToolchainSettings,
    pub locate: LocateSettings,
    pub render: RenderSettings,
    pub staging: StagingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ToolchainSettings {
    #[serde(default)]
    pub compiler: Option<PathBuf>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocateSettings {
    pub label_offset: i64,
}

impl Default for LocateSettings {
    fn default() -> Self {
        Self {
            label_offset: DEFAULT_LABEL_OFFSET,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    pub before: usize,
    pub after: usize,
    pub theme: String,
    pub color: ColorChoice,
    pub fold_braces: bool,
}

impl RenderSettings {
    pub fn context_size(&self) -> ContextSize {
        ContextSize {
            before: self.before,
            after: self.after,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        let size = ContextSize::default();
        Self {
            before: size.before,
            after: size.after,
            theme: DEFAULT_THEME.into(),
            color: ColorChoice::default(),
            fold_braces: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StagingSettings {
    #[serde(default)]
    pub root: Option<PathBuf>,
}

/// A single config file. Keys it leaves out fall through to lower layers.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigLayer {
    #[serde(default)]
    toolchain: ToolchainSettings,
    #[serde(default)]
    locate: LocateLayer,
    #[serde(default)]
    render: RenderLayer,
    #[serde(default)]
    staging: StagingSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LocateLayer {
    label_offset: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RenderLayer {
    before: Option<usize>,
    after: Option<usize>,
    theme: Option<String>,
    color: Option<ColorChoice>,
    fold_braces: Option<bool>,
}

impl ConfigLayer {
    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
            .with_context(|| format!("in config file {}", path.display()))
    }

    fn from_str(contents: &str) -> Result<Self> {
        let layer: ConfigLayer =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(layer)
    }

    fn merge(self, overlay: Self) -> Self {
        Self {
            toolchain: merge_toolchain(self.toolchain, overlay.toolchain),
            locate: LocateLayer {
                label_offset: overlay.locate.label_offset.or(self.locate.label_offset),
            },
            render: merge_render(self.render, overlay.render),
            staging: StagingSettings {
                root: overlay.staging.root.or(self.staging.root),
            },
        }
    }

    fn resolve(self) -> Config {
        let defaults = RenderSettings::default();
        Config {
            toolchain: self.toolchain,
            locate: LocateSettings {
                label_offset: self.locate.label_offset.unwrap_or(DEFAULT_LABEL_OFFSET),
            },
            render: RenderSettings {
                before: self.render.before.unwrap_or(defaults.before),
                after: self.render.after.unwrap_or(defaults.after),
                theme: self.render.theme.unwrap_or(defaults.theme),
                color: self.render.color.unwrap_or(defaults.color),
                fold_braces: self.render.fold_braces.unwrap_or(defaults.fold_braces),
            },
            staging: self.staging,
        }
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    compiler: Option<PathBuf>,
    theme: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            compiler: env::var_os("MATCHSTACK_COMPILER")
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
            theme: env::var("MATCHSTACK_THEME").ok().filter(|value| !value.is_empty()),
        }
    }

    #[cfg(test)]
    fn for_tests(compiler: &str, theme: &str) -> Self {
        Self {
            compiler: Some(PathBuf::from(compiler)),
            theme: Some(theme.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration from defaults, the user config file, an optional
    /// extra file, and env overrides.
    pub fn load(extra: Option<&Path>) -> Result<Self> {
        let env = EnvOverrides::from_env();
        Self::load_with_layers(user_config_path(), extra.map(Path::to_path_buf), env)
    }

    fn load_with_layers(
        user: Option<PathBuf>,
        extra: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<ConfigLayer> = Vec::new();

        layers.push(ConfigLayer::from_str(&DEFAULT_CONFIG)?);

        if let Some(user_path) = user.filter(|path| path.exists()) {
            tracing::debug!(path = %user_path.display(), "loading user config");
            layers.push(ConfigLayer::from_file(&user_path)?);
        }

        if let Some(extra_path) = extra {
            if !extra_path.is_file() {
                bail!("config file not found: {}", extra_path.display());
            }
            tracing::debug!(path = %extra_path.display(), "loading extra config");
            layers.push(ConfigLayer::from_file(&extra_path)?);
        }

        let merged = layers
            .into_iter()
            .reduce(ConfigLayer::merge)
            .unwrap_or_default()
            .resolve();
        Ok(apply_env_overrides(merged, env_overrides))
    }
}

fn merge_toolchain(base: ToolchainSettings, overlay: ToolchainSettings) -> ToolchainSettings {
    ToolchainSettings {
        compiler: overlay.compiler.or(base.compiler),
        timeout_secs: overlay.timeout_secs.or(base.timeout_secs),
    }
}

fn merge_render(base: RenderLayer, overlay: RenderLayer) -> RenderLayer {
    RenderLayer {
        before: overlay.before.or(base.before),
        after: overlay.after.or(base.after),
        theme: overlay.theme.or(base.theme),
        color: overlay.color.or(base.color),
        fold_braces: overlay.fold_braces.or(base.fold_braces),
    }
}

fn user_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join(USER_CONFIG_PATH))
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(compiler) = env.compiler {
        config.toolchain.compiler = Some(compiler);
    }
    if let Some(theme) = env.theme {
        config.render.theme = theme;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_uses_defaults_when_no_files() {
        let config = Config::load_with_layers(None, None, EnvOverrides::default())
            .expect("load default config");
        assert_eq!(config.locate.label_offset, -1);
        assert_eq!(config.render.context_size(), ContextSize { before: 5, after: 20 });
        assert_eq!(config.render.theme, DEFAULT_THEME);
        assert_eq!(config.render.color, ColorChoice::Auto);
        assert!(config.render.fold_braces);
        assert_eq!(config.toolchain.compiler, None);
        assert_eq!(config.toolchain.timeout_secs, None);
    }

    #[test]
    fn merge_user_and_extra() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let user = temp.path().join("config.toml");
        fs::write(
            &user,
            r#"
[toolchain]
compiler = "/opt/arson/arsonc"
timeout_secs = 30
[render]
before = 2
"#,
        )?;

        let extra = temp.path().join("project.toml");
        fs::write(
            &extra,
            r#"
[locate]
label_offset = 1
[render]
after = 8
color = "never"
fold_braces = false
"#,
        )?;

        let config = Config::load_with_layers(Some(user), Some(extra), EnvOverrides::default())?;

        assert_eq!(
            config.toolchain.compiler.as_deref(),
            Some(Path::new("/opt/arson/arsonc"))
        );
        assert_eq!(config.toolchain.timeout_secs, Some(30));
        assert_eq!(config.locate.label_offset, 1);
        assert_eq!(config.render.context_size(), ContextSize { before: 2, after: 8 });
        assert_eq!(config.render.color, ColorChoice::Never);
        assert!(!config.render.fold_braces);
        Ok(())
    }

    #[test]
    fn higher_layer_can_restore_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let user = temp.path().join("config.toml");
        fs::write(
            &user,
            r#"
[locate]
label_offset = 1
[render]
before = 9
after = 3
theme = "InspiredGitHub"
color = "never"
fold_braces = false
"#,
        )?;

        let extra = temp.path().join("project.toml");
        fs::write(
            &extra,
            r#"
[locate]
label_offset = -1
[render]
before = 5
after = 20
theme = "base16-ocean.dark"
color = "auto"
fold_braces = true
"#,
        )?;

        let config = Config::load_with_layers(Some(user), Some(extra), EnvOverrides::default())?;

        assert_eq!(config.locate.label_offset, -1);
        assert_eq!(config.render, RenderSettings::default());
        Ok(())
    }

    #[test]
    fn missing_user_file_is_skipped() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load_with_layers(
            Some(temp.path().join("absent.toml")),
            None,
            EnvOverrides::default(),
        )?;
        assert_eq!(config, Config::load_with_layers(None, None, EnvOverrides::default())?);
        Ok(())
    }

    #[test]
    fn missing_extra_file_is_an_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let result = Config::load_with_layers(
            None,
            Some(temp.path().join("absent.toml")),
            EnvOverrides::default(),
        );
        let err = result.expect_err("extra config must exist");
        assert!(err.to_string().contains("config file not found"));
        Ok(())
    }

    #[test]
    fn env_overrides_take_precedence() -> Result<()> {
        let overrides = EnvOverrides::for_tests("/usr/local/bin/arsonc", "InspiredGitHub");
        let config = Config::load_with_layers(None, None, overrides)?;
        assert_eq!(
            config.toolchain.compiler.as_deref(),
            Some(Path::new("/usr/local/bin/arsonc"))
        );
        assert_eq!(config.render.theme, "InspiredGitHub");
        Ok(())
    }

    #[test]
    fn invalid_config_returns_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("broken.toml");
        fs::write(&file, "this is not toml")?;
        let result = ConfigLayer::from_file(&file);
        assert!(result.is_err());
        Ok(())
    }
}
