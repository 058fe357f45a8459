use std::process::{Command, Output, Stdio};

use crate::error::{Error, Result};

/// Renders `cmd` the way it would be typed in a shell, for logs and errors.
pub fn render(cmd: &Command) -> String {
  std::iter::once(cmd.get_program())
    .chain(cmd.get_args())
    .map(|s| s.to_string_lossy())
    .collect::<Vec<_>>()
    .join(" ")
}

fn program(cmd: &Command) -> String {
  cmd.get_program().to_string_lossy().into_owned()
}

/// Runs `cmd` to completion with inherited stdio.
pub fn run(cmd: &mut Command) -> Result<()> {
  let command = render(cmd);
  tracing::info!("» {command}");

  let status = cmd.status().map_err(|source| Error::Spawn {
    program: program(cmd),
    source,
  })?;

  if !status.success() {
    return Err(Error::ToolFailed { command, status });
  }

  Ok(())
}

/// Runs `cmd` to completion and captures its stdout. Stderr stays attached to
/// the terminal.
pub fn run_captured(cmd: &mut Command) -> Result<Output> {
  let command = render(cmd);
  tracing::info!("» {command}");

  let output = cmd
    .stdout(Stdio::piped())
    .stderr(Stdio::inherit())
    .output()
    .map_err(|source| Error::Spawn {
      program: program(cmd),
      source,
    })?;

  if !output.status.success() {
    return Err(Error::ToolFailed {
      command,
      status: output.status,
    });
  }

  Ok(output)
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;

  #[test]
  fn render_joins_program_and_args() {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-y", "-i", "a b.txt"]);
    assert_eq!(render(&cmd), "ffmpeg -y -i a b.txt");
  }

  #[test]
  fn non_zero_exit_carries_command() {
    let err = run(&mut Command::new("false")).unwrap_err();
    match err {
      Error::ToolFailed { command, status } => {
        assert_eq!(command, "false");
        assert!(!status.success());
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn missing_program_is_spawn_error() {
    let err = run(&mut Command::new("/nonexistent/chunksep-tool")).unwrap_err();
    assert!(matches!(err, Error::Spawn { .. }));
  }

  #[test]
  fn captures_stdout() {
    let out = run_captured(Command::new("echo").arg("hello")).unwrap();
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "hello");
  }
}
