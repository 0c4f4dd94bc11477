use std::path::{Path, PathBuf};

use serde::Deserialize;
use shaderlink::{ValidationPolicy, SUPPORTED_VERSIONS};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSetting {
    Skip,
    Warn,
    Enforce,
}

impl From<ValidationSetting> for ValidationPolicy {
    fn from(setting: ValidationSetting) -> Self {
        match setting {
            ValidationSetting::Skip => ValidationPolicy::Skip,
            ValidationSetting::Warn => ValidationPolicy::Warn,
            ValidationSetting::Enforce => ValidationPolicy::Enforce,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub validation: Option<ValidationSetting>,
    #[serde(default)]
    pub glsl_version: Option<u16>,
    #[serde(default)]
    pub shaders: ShaderPaths,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShaderPaths {
    pub vertex: Option<PathBuf>,
    pub fragment: Option<PathBuf>,
}

fn default_version() -> u32 {
    1
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            validation: None,
            glsl_version: None,
            shaders: ShaderPaths::default(),
        }
    }
}

impl LinkConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if let Some(version) = self.glsl_version {
            if !SUPPORTED_VERSIONS.contains(&version) {
                return Err(ConfigError::Invalid(format!(
                    "glsl_version {version} is not supported; expected 440, 450, or 460"
                )));
            }
        }

        for (stage, path) in [
            ("vertex", &self.shaders.vertex),
            ("fragment", &self.shaders.fragment),
        ] {
            if path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "shaders.{stage} may not be empty"
                )));
            }
        }

        Ok(())
    }

    /// Anchors relative shader paths at `base` (the directory holding the config file).
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        for path in [&mut self.shaders.vertex, &mut self.shaders.fragment]
            .into_iter()
            .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }
}
