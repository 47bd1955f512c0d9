pub mod bootstrap;

use std::fmt;
use std::str::FromStr;

pub use bootstrap::Bootstrapper;

/// JavaScript module convention of the target project.
///
/// Decides which remote script is downloaded and how it is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// `require` / `module.exports`; the script exports `generateSchemas`
    CommonJs,
    /// `import` / `export`; the script does its work when loaded
    EsModule,
}

impl ModuleKind {
    /// Prompt choices, in display order
    pub const ALL: [ModuleKind; 2] = [ModuleKind::CommonJs, ModuleKind::EsModule];

    pub fn label(self) -> &'static str {
        match self {
            ModuleKind::CommonJs => "CommonJS",
            ModuleKind::EsModule => "ES Modules",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ModuleKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cjs" | "commonjs" => Ok(ModuleKind::CommonJs),
            "esm" | "es" | "module" | "es modules" => Ok(ModuleKind::EsModule),
            other => Err(anyhow::anyhow!(
                "unknown module kind '{other}' (expected cjs or esm)"
            )),
        }
    }
}

/// Step of the setup flow that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Prompt,
    Fetch,
    Execute,
}

impl Stage {
    /// Prefix printed in front of the error text
    pub fn message(self) -> &'static str {
        match self {
            Stage::Prompt => "Error during setup:",
            Stage::Fetch | Stage::Execute => "Error fetching or running the script:",
        }
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum Outcome {
    /// The marker directory is absent; guidance was printed.
    MarkerMissing,
    /// The script ran to completion.
    Completed(ModuleKind),
    /// The CommonJS script ran but exported no `generateSchemas`.
    MissingExport,
    Failed { stage: Stage, error: anyhow::Error },
}

impl Outcome {
    /// Process exit status for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::MarkerMissing | Outcome::Completed(_) | Outcome::MissingExport => 0,
            Outcome::Failed { .. } => 1,
        }
    }
}
