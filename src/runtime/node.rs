//! Node.js subprocess runtime.
//!
//! CommonJS scripts are written to a private scratch directory and run by
//! `node -e <harness> <script> <status>`. The harness builds a `vm` context
//! with the usual CommonJS bindings, runs the body, calls `generateSchemas`,
//! and records what it found in the status file. ES module scripts are
//! loaded with a dynamic `import()` of their `file://` URL.
//!
//! stdin/stdout/stderr are inherited so the script talks to the operator
//! directly.

use std::path::Path;
use std::process::Stdio;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

use super::{RunStatus, ScriptRuntime};
use crate::fetch::RemoteScript;

/// Status written by the harness right before `generateSchemas()` runs.
const STATUS_CALLED: &str = "called";

/// Status written by the harness when there is no `generateSchemas` export.
const STATUS_MISSING_EXPORT: &str = "missing-export";

const COMMONJS_HARNESS: &str = r#"
const fs = require('fs');
const vm = require('vm');
const [scriptPath, statusPath] = process.argv.slice(1);
const source = fs.readFileSync(scriptPath, 'utf8');
const context = vm.createContext({
  require,
  console,
  process,
  exports: {},
  module: { exports: {} },
});
new vm.Script(source, { filename: 'generate-tina-schema.cjs' }).runInContext(context);
if (typeof context.module.exports.generateSchemas === 'function') {
  fs.writeFileSync(statusPath, 'called');
  context.module.exports.generateSchemas();
} else {
  fs.writeFileSync(statusPath, 'missing-export');
}
"#;

const MODULE_HARNESS: &str = "await import(process.argv[1]);";

pub struct NodeRuntime {
    program: String,
}

impl NodeRuntime {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn commonjs_command(&self, script_path: &Path, status_path: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-e")
            .arg(COMMONJS_HARNESS)
            .arg(script_path)
            .arg(status_path)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        cmd
    }

    fn module_command(&self, url: &Url) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--input-type=module")
            .arg("-e")
            .arg(MODULE_HARNESS)
            .arg(url.as_str())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        cmd
    }
}

#[async_trait]
impl ScriptRuntime for NodeRuntime {
    async fn run_commonjs(&self, script: &RemoteScript) -> Result<RunStatus> {
        info!("Running CommonJS script from {} with {}", script.url, self.program);

        // Removed on drop, together with the status file
        let scratch = tempfile::Builder::new()
            .prefix("tina-setup-")
            .tempdir()
            .map_err(|e| anyhow!("Cannot create scratch directory: {e}"))?;
        let script_path = scratch.path().join("generate-tina-schema.cjs");
        let status_path = scratch.path().join("status");
        tokio::fs::write(&script_path, &script.body)
            .await
            .map_err(|e| anyhow!("Cannot write {}: {e}", script_path.display()))?;

        let status = self
            .commonjs_command(&script_path, &status_path)
            .status()
            .await
            .map_err(|e| anyhow!("Cannot start `{}`: {e}", self.program))?;
        debug!("`{}` exited with {status}", self.program);
        check_exit(&self.program, status.code())?;

        let reported = tokio::fs::read_to_string(&status_path).await.ok();
        read_status(&self.program, reported.as_deref())
    }

    async fn run_module(&self, path: &Path) -> Result<()> {
        let url = file_url(path)?;
        info!("Importing {url} with {}", self.program);

        let status = self
            .module_command(&url)
            .status()
            .await
            .map_err(|e| anyhow!("Cannot start `{}`: {e}", self.program))?;
        debug!("`{}` exited with {status}", self.program);

        check_exit(&self.program, status.code())
    }

    fn description(&self) -> String {
        self.program.clone()
    }
}

/// `file://` URL for an absolute path.
fn file_url(path: &Path) -> Result<Url> {
    Url::from_file_path(path)
        .map_err(|()| anyhow!("Cannot convert {} to a file URL", path.display()))
}

/// Any non-zero exit is a failure. `None` means killed by a signal.
fn check_exit(program: &str, code: Option<i32>) -> Result<()> {
    match code {
        Some(0) => Ok(()),
        Some(code) => Err(anyhow!("`{program}` exited with code {code}")),
        None => Err(anyhow!("`{program}` was terminated by a signal")),
    }
}

/// Maps the harness status file to a run status.
fn read_status(program: &str, reported: Option<&str>) -> Result<RunStatus> {
    match reported.map(str::trim) {
        Some(STATUS_CALLED) => Ok(RunStatus::Completed),
        Some(STATUS_MISSING_EXPORT) => Ok(RunStatus::MissingExport),
        Some(other) => Err(anyhow!("`{program}` reported unknown status '{other}'")),
        None => Err(anyhow!(
            "`{program}` exited before the script finished loading"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn script(body: &str) -> RemoteScript {
        RemoteScript {
            url: "https://example.com/generate-tina-schema.cjs".to_string(),
            body: body.to_string(),
        }
    }

    /// JS string literal for a path.
    fn js_path(path: &Path) -> String {
        format!("{:?}", path.to_string_lossy())
    }

    fn node_available() -> bool {
        std::process::Command::new("node")
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    // ── check_exit / read_status ────────────────────────

    #[test]
    fn test_check_exit_success() {
        assert!(check_exit("node", Some(0)).is_ok());
    }

    #[test]
    fn test_check_exit_failure_codes() {
        let err = check_exit("node", Some(1)).unwrap_err();
        assert_eq!(err.to_string(), "`node` exited with code 1");
        // A script exiting with 3 is a failure, not a missing export
        let err = check_exit("node", Some(3)).unwrap_err();
        assert_eq!(err.to_string(), "`node` exited with code 3");
        let err = check_exit("node", None).unwrap_err();
        assert!(err.to_string().contains("signal"));
    }

    #[test]
    fn test_read_status() {
        assert_eq!(
            read_status("node", Some("called")).unwrap(),
            RunStatus::Completed
        );
        assert_eq!(
            read_status("node", Some("missing-export\n")).unwrap(),
            RunStatus::MissingExport
        );
        assert!(read_status("node", Some("bogus")).is_err());
        let err = read_status("node", None).unwrap_err();
        assert!(err.to_string().contains("before the script finished"));
    }

    // ── file_url ────────────────────────────────────────

    #[cfg(unix)]
    #[test]
    fn test_file_url_absolute_path() {
        let url = file_url(Path::new("/tmp/temp-script.mjs")).unwrap();
        assert_eq!(url.as_str(), "file:///tmp/temp-script.mjs");
    }

    #[test]
    fn test_file_url_rejects_relative_path() {
        assert!(file_url(Path::new("temp-script.mjs")).is_err());
    }

    // ── commands ────────────────────────────────────────

    #[test]
    fn test_commonjs_command_passes_paths_as_args() {
        let runtime = NodeRuntime::new("node");
        let cmd = runtime.commonjs_command(Path::new("/s/script.cjs"), Path::new("/s/status"));
        let args: Vec<_> = cmd.as_std().get_args().collect();
        assert_eq!(args.len(), 4);
        assert_eq!(args[0], "-e");
        assert_eq!(args[1], COMMONJS_HARNESS);
        assert_eq!(args[2], "/s/script.cjs");
        assert_eq!(args[3], "/s/status");
    }

    #[test]
    fn test_description_is_program() {
        assert_eq!(NodeRuntime::new("/usr/local/bin/node").description(), "/usr/local/bin/node");
    }

    // ── spawning (fake runtime) ─────────────────────────

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let runtime = NodeRuntime::new("tina-setup-no-such-runtime");
        let err = runtime.run_commonjs(&script("1")).await.unwrap_err();
        assert!(err.to_string().contains("Cannot start"));

        let dir = tempfile::tempdir().unwrap();
        let err = runtime
            .run_module(&dir.path().join("temp-script.mjs"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Cannot start"));
    }

    /// Writes an executable shell script standing in for `node`.
    #[cfg(unix)]
    fn fake_runtime(dir: &Path, body: &str) -> NodeRuntime {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-node");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        NodeRuntime::new(path.to_string_lossy().into_owned())
    }

    // $3 is the script path and $4 the status path after `-e <harness>`

    #[cfg(unix)]
    #[tokio::test]
    async fn test_commonjs_receives_script_as_file() {
        let dir = tempfile::tempdir().unwrap();
        let captured = dir.path().join("script.txt");
        let runtime = fake_runtime(
            dir.path(),
            &format!("cp \"$3\" '{}'\nprintf called > \"$4\"", captured.display()),
        );

        let status = runtime
            .run_commonjs(&script("module.exports.generateSchemas = () => {};"))
            .await
            .unwrap();
        assert_eq!(status, RunStatus::Completed);
        assert_eq!(
            std::fs::read_to_string(&captured).unwrap(),
            "module.exports.generateSchemas = () => {};"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_commonjs_missing_export_from_status_file() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = fake_runtime(dir.path(), "printf missing-export > \"$4\"");
        let status = runtime.run_commonjs(&script("1 + 1;")).await.unwrap();
        assert_eq!(status, RunStatus::MissingExport);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_commonjs_exit_code_three_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = fake_runtime(dir.path(), "printf called > \"$4\"\nexit 3");
        let err = runtime.run_commonjs(&script("1;")).await.unwrap_err();
        assert!(err.to_string().contains("exited with code 3"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_commonjs_no_status_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = fake_runtime(dir.path(), "exit 0");
        assert!(runtime.run_commonjs(&script("1;")).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_module_receives_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let captured = dir.path().join("args.txt");
        // $4 is the URL after `--input-type=module -e <harness>`
        let runtime = fake_runtime(dir.path(), &format!("echo \"$4\" > '{}'", captured.display()));
        let module = dir.path().join("temp-script.mjs");
        std::fs::write(&module, "export {};").unwrap();

        runtime.run_module(&module).await.unwrap();
        let arg = std::fs::read_to_string(&captured).unwrap();
        assert_eq!(arg.trim(), file_url(&module).unwrap().as_str());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_module_error_exit() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = fake_runtime(dir.path(), "exit 3");
        let module = dir.path().join("temp-script.mjs");
        std::fs::write(&module, "throw new Error('boom');").unwrap();

        assert!(runtime.run_module(&module).await.is_err());
    }

    // ── real node (skipped when not installed) ──────────

    #[tokio::test]
    async fn test_node_generate_schemas_called_once() {
        if !node_available() {
            eprintln!("node not found, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let counter = dir.path().join("count");
        let body = format!(
            "const fs = require('fs');\n\
             const p = {};\n\
             module.exports.generateSchemas = () => {{\n\
               const n = fs.existsSync(p) ? Number(fs.readFileSync(p, 'utf8')) : 0;\n\
               fs.writeFileSync(p, String(n + 1));\n\
             }};\n",
            js_path(&counter)
        );

        let status = NodeRuntime::new("node")
            .run_commonjs(&script(&body))
            .await
            .unwrap();
        assert_eq!(status, RunStatus::Completed);
        assert_eq!(std::fs::read_to_string(&counter).unwrap(), "1");
    }

    #[tokio::test]
    async fn test_node_missing_export_invokes_nothing() {
        if !node_available() {
            eprintln!("node not found, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let touched = dir.path().join("touched");
        let body = format!(
            "module.exports.somethingElse = () => require('fs').writeFileSync({}, 'x');\n",
            js_path(&touched)
        );

        let status = NodeRuntime::new("node")
            .run_commonjs(&script(&body))
            .await
            .unwrap();
        assert_eq!(status, RunStatus::MissingExport);
        assert!(!touched.exists());
    }

    #[tokio::test]
    async fn test_node_throwing_body_is_an_error() {
        if !node_available() {
            eprintln!("node not found, skipping");
            return;
        }
        let result = NodeRuntime::new("node")
            .run_commonjs(&script("throw new Error('boom');"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_node_exit_three_after_work_is_an_error() {
        if !node_available() {
            eprintln!("node not found, skipping");
            return;
        }
        let body = "module.exports.generateSchemas = () => { process.exit(3); };";
        let err = NodeRuntime::new("node")
            .run_commonjs(&script(body))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exited with code 3"));
    }

    #[tokio::test]
    async fn test_node_commonjs_script_can_read_stdin() {
        if !node_available() {
            eprintln!("node not found, skipping");
            return;
        }
        use tokio::io::AsyncWriteExt;

        let dir = tempfile::tempdir().unwrap();
        let answer = dir.path().join("answer");
        let script_path = dir.path().join("generate-tina-schema.cjs");
        let status_path = dir.path().join("status");
        std::fs::write(
            &script_path,
            format!(
                "module.exports.generateSchemas = () => {{\n\
                   const fs = require('fs');\n\
                   fs.writeFileSync({}, 'got:' + fs.readFileSync(0, 'utf8'));\n\
                 }};\n",
                js_path(&answer)
            ),
        )
        .unwrap();

        // Stands in for the operator's terminal
        let mut cmd = NodeRuntime::new("node").commonjs_command(&script_path, &status_path);
        cmd.stdin(Stdio::piped());
        let mut child = cmd.spawn().unwrap();
        let mut stdin = child.stdin.take().unwrap();
        stdin.write_all(b"operator-answer\n").await.unwrap();
        drop(stdin);
        assert!(child.wait().await.unwrap().success());

        assert_eq!(
            std::fs::read_to_string(&answer).unwrap(),
            "got:operator-answer\n"
        );
        assert_eq!(std::fs::read_to_string(&status_path).unwrap(), "called");
    }

    #[tokio::test]
    async fn test_node_module_side_effect_runs_on_import() {
        if !node_available() {
            eprintln!("node not found, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let marker: PathBuf = dir.path().join("loaded");
        let module = dir.path().join("temp-script.mjs");
        std::fs::write(
            &module,
            format!(
                "import {{ writeFileSync }} from 'fs';\n\
                 await Promise.resolve();\n\
                 writeFileSync({}, 'loaded');\n",
                js_path(&marker)
            ),
        )
        .unwrap();

        NodeRuntime::new("node").run_module(&module).await.unwrap();
        assert_eq!(std::fs::read_to_string(&marker).unwrap(), "loaded");
    }

    #[tokio::test]
    async fn test_node_throwing_module_is_an_error() {
        if !node_available() {
            eprintln!("node not found, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("temp-script.mjs");
        std::fs::write(&module, "throw new Error('boom');\n").unwrap();

        assert!(NodeRuntime::new("node").run_module(&module).await.is_err());
    }
}
