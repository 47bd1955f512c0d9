use std::path::PathBuf;

use anyhow::Result;
use tracing::{error, info, warn};

use super::{ModuleKind, Outcome, Stage};
use crate::config::Config;
use crate::fetch::{RemoteScript, ScriptFetcher};
use crate::prompt::ModulePrompt;
use crate::runtime::{RunStatus, ScriptRuntime, TempScript};

/// Warning logged when a CommonJS script has no entry point.
pub const MISSING_EXPORT_WARNING: &str =
    "No function named 'generateSchemas' found in the script.";

/// Text printed when the marker directory is missing.
pub fn guidance_message(marker_dir: &str, docs_url: &str) -> String {
    format!(
        "The \"{marker_dir}\" folder does not exist. Please visit the following link to install the Tina package first:\n{docs_url}"
    )
}

/// The setup flow: marker check, module-kind prompt, fetch, execute.
///
/// Every stage failure is logged and returned as an `Outcome`; nothing
/// is propagated past `run()`.
pub struct Bootstrapper {
    config: Config,
    project_root: PathBuf,
    temp_dir: PathBuf,
    prompt: Box<dyn ModulePrompt>,
    fetcher: Box<dyn ScriptFetcher>,
    runtime: Box<dyn ScriptRuntime>,
}

impl Bootstrapper {
    pub fn new(
        config: Config,
        project_root: PathBuf,
        temp_dir: PathBuf,
        prompt: Box<dyn ModulePrompt>,
        fetcher: Box<dyn ScriptFetcher>,
        runtime: Box<dyn ScriptRuntime>,
    ) -> Self {
        Self {
            config,
            project_root,
            temp_dir,
            prompt,
            fetcher,
            runtime,
        }
    }

    pub fn marker_path(&self) -> PathBuf {
        self.project_root.join(&self.config.project.marker_dir)
    }

    /// Where ES module scripts are written before import
    pub fn temp_script_path(&self) -> PathBuf {
        self.temp_dir.join(&self.config.runtime.temp_file_name)
    }

    pub async fn run(&self) -> Outcome {
        let marker = self.marker_path();
        if !tokio::fs::try_exists(&marker).await.unwrap_or(false) {
            info!("Marker directory {} not found", marker.display());
            println!(
                "{}",
                guidance_message(&self.config.project.marker_dir, &self.config.project.docs_url)
            );
            return Outcome::MarkerMissing;
        }

        let kind = match self.prompt.choose().await {
            Ok(kind) => kind,
            Err(e) => return fail(Stage::Prompt, e),
        };
        info!("Module kind: {kind}");

        let url = self.config.sources.url_for(kind);
        let script = match self.fetch(kind, url).await {
            Ok(script) => script,
            Err(e) => return fail(Stage::Fetch, e),
        };

        match kind {
            ModuleKind::CommonJs => match self.runtime.run_commonjs(&script).await {
                Ok(RunStatus::Completed) => Outcome::Completed(kind),
                Ok(RunStatus::MissingExport) => {
                    warn!("{MISSING_EXPORT_WARNING}");
                    Outcome::MissingExport
                }
                Err(e) => fail(Stage::Execute, e),
            },
            ModuleKind::EsModule => match self.run_module(&script).await {
                Ok(()) => Outcome::Completed(kind),
                Err(e) => fail(Stage::Execute, e),
            },
        }
    }

    async fn fetch(&self, kind: ModuleKind, url: &str) -> Result<RemoteScript> {
        let script = self.fetcher.fetch(url).await?;
        if let Some(expected) = self.config.sources.sha256_for(kind) {
            script.verify_sha256(expected)?;
            info!("Integrity check passed for {url}");
        }
        Ok(script)
    }

    /// Writes the module to the temp path, imports it, and removes the
    /// file whether or not the import succeeded.
    async fn run_module(&self, script: &RemoteScript) -> Result<()> {
        let temp = TempScript::write(self.temp_script_path(), &script.body).await?;
        let result = self.runtime.run_module(temp.path()).await;
        temp.remove().await;
        result
    }
}

fn fail(stage: Stage, error: anyhow::Error) -> Outcome {
    error!("{} {error:#}", stage.message());
    Outcome::Failed { stage, error }
}
