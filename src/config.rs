//! Layered configuration: built-in defaults, user file, explicit file, environment.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::tool::ToolCommand;

const DEFAULT_ARCH: &str = "arm64";
const DEFAULT_SYMBOLICATECRASH: &str = "/Applications/Xcode.app/Contents/SharedFrameworks/DVTFoundation.framework/Versions/A/Resources/symbolicatecrash";
const DEFAULT_DEVELOPER_DIR: &str = "/Applications/Xcode.app/Contents/Developer";
const ATOS_PROBE: [&str; 3] = ["/usr/bin/atos", "/usr/local/bin/atos", "/opt/homebrew/bin/atos"];

/// Resolved settings handed to every symbolication operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// CPU architecture for atos. Unset means detect from the report, else arm64.
    pub arch: Option<String>,
    pub tools: Tools,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    /// Explicit atos path. Skips probing when set.
    pub atos: Option<PathBuf>,
    pub atos_probe: Vec<PathBuf>,
    pub symbolicatecrash: PathBuf,
    pub developer_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            arch: None,
            tools: Tools::default(),
        }
    }
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            atos: None,
            atos_probe: ATOS_PROBE.iter().map(PathBuf::from).collect(),
            symbolicatecrash: PathBuf::from(DEFAULT_SYMBOLICATECRASH),
            developer_dir: PathBuf::from(DEFAULT_DEVELOPER_DIR),
        }
    }
}

/// One TOML layer. Every field is optional so a file only overrides what it names.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Layer {
    arch: Option<String>,
    #[serde(default)]
    tools: ToolsLayer,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ToolsLayer {
    atos: Option<PathBuf>,
    atos_probe: Option<Vec<PathBuf>>,
    symbolicatecrash: Option<PathBuf>,
    developer_dir: Option<PathBuf>,
}

/// Environment overrides applied after file layers.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    atos: Option<PathBuf>,
    arch: Option<String>,
    developer_dir: Option<PathBuf>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            atos: env::var_os("CRASHSYM_ATOS").map(PathBuf::from),
            arch: env::var("CRASHSYM_ARCH").ok(),
            developer_dir: env::var_os("CRASHSYM_DEVELOPER_DIR").map(PathBuf::from),
        }
    }

    #[cfg(test)]
    fn for_tests(atos: &str, arch: &str) -> Self {
        Self {
            atos: Some(PathBuf::from(atos)),
            arch: Some(arch.to_owned()),
            developer_dir: None,
        }
    }
}

impl Config {
    /// Load defaults, the user config file, an optional explicit file, then env overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_with_layers(user_config_path(), explicit, EnvOverrides::from_env())
    }

    fn load_with_layers(
        user: Option<PathBuf>,
        explicit: Option<&Path>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = user.filter(|path| path.exists()) {
            tracing::debug!(path = %path.display(), "loading user config");
            config.apply(Layer::from_file(&path)?);
        }

        if let Some(path) = explicit {
            tracing::debug!(path = %path.display(), "loading config");
            config.apply(Layer::from_file(path)?);
        }

        config.apply_env(env_overrides);
        Ok(config)
    }

    fn apply(&mut self, layer: Layer) {
        if layer.arch.is_some() {
            self.arch = layer.arch;
        }
        let tools = layer.tools;
        if tools.atos.is_some() {
            self.tools.atos = tools.atos;
        }
        if let Some(probe) = tools.atos_probe {
            self.tools.atos_probe = probe;
        }
        if let Some(path) = tools.symbolicatecrash {
            self.tools.symbolicatecrash = path;
        }
        if let Some(path) = tools.developer_dir {
            self.tools.developer_dir = path;
        }
    }

    fn apply_env(&mut self, overrides: EnvOverrides) {
        if overrides.atos.is_some() {
            self.tools.atos = overrides.atos;
        }
        if overrides.arch.is_some() {
            self.arch = overrides.arch;
        }
        if let Some(dir) = overrides.developer_dir {
            self.tools.developer_dir = dir;
        }
    }

    pub fn arch(&self) -> &str {
        self.arch.as_deref().unwrap_or(DEFAULT_ARCH)
    }

    /// The atos invocation to use: explicit path, first existing probe path, or `xcrun atos`.
    pub fn atos_command(&self) -> ToolCommand {
        self.atos_command_with(|path| path.is_file())
    }

    fn atos_command_with(&self, exists: impl Fn(&Path) -> bool) -> ToolCommand {
        if let Some(path) = &self.tools.atos {
            return ToolCommand::new(path);
        }
        match self.tools.atos_probe.iter().find(|path| exists(path)) {
            Some(path) => ToolCommand::new(path),
            None => {
                tracing::debug!("no atos on probe paths, falling back to xcrun");
                ToolCommand::new("xcrun").with_leading_arg("atos")
            }
        }
    }
}

impl Layer {
    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|err| Error::read(path, err))?;
        toml::from_str(&data)
            .map_err(|err| Error::Config(format!("{}: {}", path.display(), err)))
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|dir| dir.join("crashsym").join("config.toml"))
}
