//! Execution of the fetched script.
//!
//! The crate never evaluates JavaScript itself. A `ScriptRuntime` hands the
//! payload to an external interpreter; `NodeRuntime` is the only one.

pub mod node;
pub mod temp;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::fetch::RemoteScript;

pub use node::NodeRuntime;
pub use temp::TempScript;

/// Result of a script run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// CommonJS only: the script exports no `generateSchemas` function.
    MissingExport,
}

/// Runs setup scripts in an external JavaScript runtime.
#[async_trait]
pub trait ScriptRuntime: Send + Sync {
    /// Runs `script` as a CommonJS body with `require`, `console`,
    /// `process`, `exports` and `module` bound, then calls
    /// `module.exports.generateSchemas()` if it is a function.
    async fn run_commonjs(&self, script: &RemoteScript) -> Result<RunStatus>;

    /// Imports the ES module at `path` and waits for its top-level effects.
    async fn run_module(&self, path: &Path) -> Result<()>;

    /// Human-readable description, e.g. `"node"`.
    fn description(&self) -> String;
}
