use serde::Deserialize;
use std::path::Path;
use tracing::warn;

use crate::setup::ModuleKind;

/// Config file picked up from the project root when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "tina-setup.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProjectConfig {
    /// Directory whose presence means the CMS integration is installed
    #[serde(default = "default_marker_dir")]
    pub marker_dir: String,
    /// Link printed when the marker directory is missing
    #[serde(default = "default_docs_url")]
    pub docs_url: String,
}

/// Where the setup scripts come from.
///
/// The built-in URLs point at a third-party fork; deployments are expected
/// to override them.
#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    /// Supports ${ENV_VAR} substitution
    #[serde(default = "default_commonjs_url")]
    pub commonjs_url: String,
    /// Supports ${ENV_VAR} substitution
    #[serde(default = "default_esm_url")]
    pub esm_url: String,
    /// Expected SHA-256 (hex) of the CommonJS script, checked before running it
    #[serde(default)]
    pub commonjs_sha256: Option<String>,
    /// Expected SHA-256 (hex) of the ES module script
    #[serde(default)]
    pub esm_sha256: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct HttpConfig {
    /// Request timeout. No timeout when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// JavaScript runtime used to execute the fetched script
    #[serde(default = "default_program")]
    pub program: String,
    /// File name (inside the OS temp dir) the ES module script is written to
    #[serde(default = "default_temp_file_name")]
    pub temp_file_name: String,
}

fn default_marker_dir() -> String {
    "tina".to_string()
}

fn default_docs_url() -> String {
    "https://docs.astro.build/en/guides/cms/tina-cms".to_string()
}

fn default_commonjs_url() -> String {
    "https://raw.githubusercontent.com/tfmurad/test/main/dist/scripts/generate-tina-schema.cjs"
        .to_string()
}

fn default_esm_url() -> String {
    "https://raw.githubusercontent.com/tfmurad/test/main/dist/scripts/generate-tina-schema.mjs"
        .to_string()
}

fn default_program() -> String {
    "node".to_string()
}

fn default_temp_file_name() -> String {
    "temp-script.mjs".to_string()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            marker_dir: default_marker_dir(),
            docs_url: default_docs_url(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            commonjs_url: default_commonjs_url(),
            esm_url: default_esm_url(),
            commonjs_sha256: None,
            esm_sha256: None,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            temp_file_name: default_temp_file_name(),
        }
    }
}

impl SourcesConfig {
    /// URL of the setup script for a module kind. Nothing else feeds into it.
    pub fn url_for(&self, kind: ModuleKind) -> &str {
        match kind {
            ModuleKind::CommonJs => &self.commonjs_url,
            ModuleKind::EsModule => &self.esm_url,
        }
    }

    /// Pinned digest for a module kind, if any
    pub fn sha256_for(&self, kind: ModuleKind) -> Option<&str> {
        match kind {
            ModuleKind::CommonJs => self.commonjs_sha256.as_deref(),
            ModuleKind::EsModule => self.esm_sha256.as_deref(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses TOML after expanding environment variables like ${TINA_SOURCE}
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let expanded = shellexpand::env(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Resolves the configuration for a run.
    ///
    /// An explicit path must exist. Otherwise `tina-setup.toml` in the
    /// project root is used when present, and built-in defaults when not.
    /// Environment overrides are applied last.
    pub fn resolve(project_root: &Path, explicit: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)
                .map_err(|e| anyhow::anyhow!("Cannot load config {}: {e}", path.display()))?,
            None => {
                let candidate = project_root.join(DEFAULT_CONFIG_FILE);
                if candidate.is_file() {
                    Self::load(&candidate).map_err(|e| {
                        anyhow::anyhow!("Cannot load config {}: {e}", candidate.display())
                    })?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Like `resolve`, but a project without the default marker directory
    /// falls back to built-in defaults when the config cannot be loaded, so
    /// it still gets the install guidance instead of a config error.
    pub fn resolve_for_project(
        project_root: &Path,
        explicit: Option<&Path>,
    ) -> anyhow::Result<Self> {
        match Self::resolve(project_root, explicit) {
            Ok(config) => Ok(config),
            Err(e) if !project_root.join(default_marker_dir()).exists() => {
                warn!("Ignoring configuration, no {} folder: {e:#}", default_marker_dir());
                let mut config = Self::default();
                config.apply_env_overrides(|key| std::env::var(key).ok());
                Ok(config)
            }
            Err(e) => Err(e),
        }
    }

    /// Applies `TINA_SETUP_*` overrides. Empty values are ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = get("TINA_SETUP_COMMONJS_URL") {
            self.sources.commonjs_url = url;
        }
        if let Some(url) = get("TINA_SETUP_ESM_URL") {
            self.sources.esm_url = url;
        }
        if let Some(program) = get("TINA_SETUP_NODE") {
            self.runtime.program = program;
        }
    }

    /// Request timeout as a `Duration`, if configured
    pub fn http_timeout(&self) -> Option<std::time::Duration> {
        self.http.timeout_secs.map(std::time::Duration::from_secs)
    }
}
