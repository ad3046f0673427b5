use crate::core::topology::TemplateCache;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Where template-based type assignment looks for its residue templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateConfig {
    pub bundle_dir: PathBuf,
    pub app: String,
    pub template_dir: String,
    pub extension: String,
}

impl TemplateConfig {
    /// Reads the `[templates]` table of a TOML file; missing keys are reported by the builder.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading template configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let file: PartialConfigFile = toml::from_str(&content).map_err(|e| ConfigError::Toml {
            path: path.to_path_buf(),
            source: e,
        })?;
        let partial = file.templates.unwrap_or_default();

        let mut builder = TemplateConfigBuilder::new();
        if let Some(dir) = partial.bundle_dir {
            // Relative roots are taken relative to the configuration file.
            let dir = PathBuf::from(dir);
            let dir = match path.parent() {
                Some(parent) if dir.is_relative() => parent.join(dir),
                _ => dir,
            };
            builder = builder.bundle_dir(dir);
        }
        if let Some(app) = partial.app {
            builder = builder.app(app);
        }
        if let Some(template_dir) = partial.template_dir {
            builder = builder.template_dir(template_dir);
        }
        if let Some(extension) = partial.extension {
            builder = builder.extension(extension);
        }
        builder.build()
    }

    /// Points `cache` at this configuration's bundle root.
    pub fn apply(&self, cache: &mut TemplateCache) {
        if cache.bundle_dir() != self.bundle_dir {
            cache.set_bundle_dir(self.bundle_dir.clone());
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfigFile {
    templates: Option<PartialTemplateConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialTemplateConfig {
    #[serde(rename = "bundle-dir")]
    bundle_dir: Option<String>,
    app: Option<String>,
    #[serde(rename = "template-dir")]
    template_dir: Option<String>,
    extension: Option<String>,
}

#[derive(Default)]
pub struct TemplateConfigBuilder {
    bundle_dir: Option<PathBuf>,
    app: Option<String>,
    template_dir: Option<String>,
    extension: Option<String>,
}

impl TemplateConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bundle_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundle_dir = Some(dir.into());
        self
    }
    pub fn app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }
    pub fn template_dir(mut self, dir: impl Into<String>) -> Self {
        self.template_dir = Some(dir.into());
        self
    }
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// The bundle root defaults to the working directory; everything else is required.
    pub fn build(self) -> Result<TemplateConfig, ConfigError> {
        Ok(TemplateConfig {
            bundle_dir: self.bundle_dir.unwrap_or_else(|| PathBuf::from(".")),
            app: self.app.ok_or(ConfigError::MissingParameter("app"))?,
            template_dir: self
                .template_dir
                .ok_or(ConfigError::MissingParameter("template_dir"))?,
            extension: self
                .extension
                .ok_or(ConfigError::MissingParameter("extension"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn builder_requires_app_dir_and_extension() {
        let err = TemplateConfigBuilder::new()
            .app("idatm")
            .extension("tmpl")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingParameter("template_dir")));

        let config = TemplateConfigBuilder::new()
            .app("idatm")
            .template_dir("templates")
            .extension("tmpl")
            .build()
            .unwrap();
        assert_eq!(config.bundle_dir, PathBuf::from("."));
        assert_eq!(config.app, "idatm");
    }

    #[test]
    fn from_file_resolves_relative_bundle_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("atomstruct.toml");
        fs::write(
            &path,
            r#"
[templates]
bundle-dir = "share"
app = "idatm"
template-dir = "templates"
extension = "tmpl"
"#,
        )
        .unwrap();

        let config = TemplateConfig::from_file(&path).unwrap();
        assert_eq!(config.bundle_dir, dir.path().join("share"));
        assert_eq!(config.template_dir, "templates");

        let mut cache = TemplateCache::new();
        config.apply(&mut cache);
        assert_eq!(cache.bundle_dir(), dir.path().join("share"));
    }

    #[test]
    fn from_file_reports_missing_keys_and_bad_toml() {
        let dir = TempDir::new().unwrap();
        let partial = dir.path().join("partial.toml");
        fs::write(&partial, "[templates]\napp = \"idatm\"\n").unwrap();
        assert!(matches!(
            TemplateConfig::from_file(&partial),
            Err(ConfigError::MissingParameter("template_dir"))
        ));

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "[templates]\nunknown-key = 1\n").unwrap();
        assert!(matches!(
            TemplateConfig::from_file(&broken),
            Err(ConfigError::Toml { .. })
        ));

        assert!(matches!(
            TemplateConfig::from_file(&dir.path().join("absent.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
