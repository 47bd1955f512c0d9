//! Module-kind selection.
//!
//! The interactive prompt is an `inquire` single-choice menu. It blocks the
//! calling thread, so it runs on tokio's blocking pool.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use inquire::{InquireError, Select};

use crate::setup::ModuleKind;

/// Question shown above the two choices.
pub const QUESTION: &str = "Is your project using CommonJS or ES Modules?";

/// Source of the operator's module-kind choice.
#[async_trait]
pub trait ModulePrompt: Send + Sync {
    /// Blocks until a kind is chosen. Cancellation is an error.
    async fn choose(&self) -> Result<ModuleKind>;
}

/// Arrow-key menu on the terminal.
pub struct InquirePrompt;

#[async_trait]
impl ModulePrompt for InquirePrompt {
    async fn choose(&self) -> Result<ModuleKind> {
        let answer = tokio::task::spawn_blocking(|| {
            let mut select = Select::new(QUESTION, ModuleKind::ALL.to_vec());
            select.vim_mode = true;
            select.prompt()
        })
        .await
        .map_err(|e| anyhow!("Prompt task failed: {e}"))?;

        answer.map_err(describe_error)
    }
}

/// Choice given up front (`--module`), no terminal interaction.
pub struct Preselected(pub ModuleKind);

#[async_trait]
impl ModulePrompt for Preselected {
    async fn choose(&self) -> Result<ModuleKind> {
        Ok(self.0)
    }
}

fn describe_error(err: InquireError) -> anyhow::Error {
    match err {
        InquireError::OperationCanceled => anyhow!("Selection canceled"),
        InquireError::OperationInterrupted => anyhow!("Selection interrupted"),
        InquireError::NotTTY => {
            anyhow!("No interactive terminal available (pass --module cjs|esm)")
        }
        other => anyhow!("Prompt failed: {other}"),
    }
}
