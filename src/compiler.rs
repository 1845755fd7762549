//! Compiler execution. A [`CompileTask`] either spawns the Emscripten
//! compiler directly in the job directory or wraps it in nsjail with the job
//! directory bind-mounted at `/work`.

use std::{path::Path, process::Stdio, time::Duration};

use thiserror::Error;
use tokio::{process::Command, time};

pub const OUTPUT_JS: &str = "app.js";
pub const OUTPUT_WASM: &str = "app.wasm";

/// Wall-clock deadline for one compile.
pub const COMPILE_DEADLINE: Duration = Duration::from_secs(5 * 60);

/// 256 MiB file-size rlimit inside the jail.
const JAIL_RLIMIT_FSIZE: u64 = 256 * 1024 * 1024;

#[derive(Debug)]
pub struct CompileTask<'a> {
    pub compiler: &'a str,
    pub source_file: &'a str,
    /// Filtered argument vector, already terminated with `-o app.js`.
    pub args: &'a [String],
    pub job_dir: &'a Path,
    /// Jail binary; `None` spawns the compiler directly.
    pub nsjail: Option<&'a Path>,
    pub deadline: Duration,
}

#[derive(Debug)]
pub struct CompileOutput {
    pub success: bool,
    /// Combined stdout and stderr of the compiler, unparsed.
    pub output: String,
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to run compiler: {0}")]
    Io(#[from] std::io::Error),
    #[error("compilation did not finish within the deadline")]
    DeadlineExceeded,
}

impl CompileTask<'_> {
    fn command(&self) -> Command {
        match self.nsjail {
            Some(jail) => {
                let mut cmd = Command::new(jail);
                cmd.arg("--quiet")
                    .arg("--iface_no_lo")
                    .args(["--cwd", "/work"])
                    .arg("--bindmount")
                    .arg(format!("{}:/work", self.job_dir.display()))
                    .args(["--rlimit_fsize", &JAIL_RLIMIT_FSIZE.to_string()])
                    .arg("--")
                    .arg(self.compiler)
                    .arg(self.source_file)
                    .args(self.args);
                cmd
            }
            None => {
                let mut cmd = Command::new(self.compiler);
                cmd.arg(self.source_file)
                    .args(self.args)
                    .current_dir(self.job_dir);
                cmd
            }
        }
    }

    /// Run the compiler and capture its combined output. The child inherits
    /// the parent environment (Emscripten discovers its SDK through it).
    /// `kill_on_drop` ties the child to the caller, so both the deadline and
    /// a dropped request future (client disconnect) terminate it.
    pub async fn run(&self) -> Result<CompileOutput, CompileError> {
        let mut cmd = self.command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn()?;
        let output = time::timeout(self.deadline, child.wait_with_output())
            .await
            .map_err(|_| CompileError::DeadlineExceeded)??;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CompileOutput {
            success: output.status.success(),
            output: combined,
        })
    }
}
