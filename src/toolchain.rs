//! Assemble and link generated code with the host toolchain.
//!
//! Used by the driver only; the compiler core never spawns processes.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use snafu::{ResultExt, Snafu, ensure};
use tracing::debug;

#[derive(Debug, Snafu)]
pub enum ToolchainError {
  #[snafu(display("could not find `{tool}` on PATH"))]
  NotFound { tool: String, source: which::Error },
  #[snafu(display("failed to run `{tool}`"))]
  Spawn {
    tool: String,
    source: std::io::Error,
  },
  #[snafu(display("`{tool}` exited with {status}"))]
  Failed { tool: String, status: ExitStatus },
}

/// Assemble `asm` with `nasm -felf64` and link the object into `exe` with
/// `ld`. The object file lands next to the assembly.
pub fn build(asm: &Path, exe: &Path) -> Result<PathBuf, ToolchainError> {
  let object = asm.with_extension("o");
  run(
    "nasm",
    &[
      OsStr::new("-felf64"),
      asm.as_os_str(),
      OsStr::new("-o"),
      object.as_os_str(),
    ],
  )?;
  run(
    "ld",
    &[OsStr::new("-o"), exe.as_os_str(), object.as_os_str()],
  )?;
  Ok(exe.to_path_buf())
}

fn run(tool: &str, args: &[&OsStr]) -> Result<(), ToolchainError> {
  let path = which::which(tool).context(NotFoundSnafu { tool })?;
  debug!(tool, ?args, "running toolchain step");
  let status = Command::new(&path)
    .args(args)
    .status()
    .context(SpawnSnafu { tool })?;
  ensure!(status.success(), FailedSnafu { tool, status });
  Ok(())
}
