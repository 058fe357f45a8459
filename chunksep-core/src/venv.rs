use std::{
  env,
  ffi::{OsStr, OsString},
  path::{Path, PathBuf},
  process::Command,
};

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::process::render;

/// Environment variable naming the active virtual environment root.
pub const MARKER_VAR: &str = "VIRTUAL_ENV";

const LONG_FLAG: &str = "--venv";
const SHORT_FLAG: &str = "-V";

fn interpreter_candidates(root: &Path) -> SmallVec<[PathBuf; 2]> {
  let mut candidates = SmallVec::new();
  candidates.push(root.join("bin").join("python"));
  candidates.push(root.join("Scripts").join("python.exe"));
  candidates
}

/// Locates the interpreter of the environment rooted at `root`.
pub fn find_interpreter(root: impl AsRef<Path>) -> Result<PathBuf> {
  let root = root.as_ref();

  if !root.exists() {
    return Err(Error::EnvRootMissing(root.to_path_buf()));
  }

  interpreter_candidates(root)
    .into_iter()
    .find(|p| p.exists())
    .ok_or_else(|| Error::InterpreterMissing(root.to_path_buf()))
}

/// Removes the environment selection flag and its value from `args`.
///
/// Handles `--venv <v>`, `-V <v>`, `--venv=<v>`, `-V=<v>` and `-V<v>`. A
/// separate value token is only consumed when it does not start with `-`.
pub fn strip_venv_args<I, S>(args: I) -> Vec<OsString>
where
  I: IntoIterator<Item = S>,
  S: Into<OsString>,
{
  let mut res = Vec::new();
  let mut args = args.into_iter().map(Into::<OsString>::into).peekable();

  while let Some(arg) = args.next() {
    let text = arg.to_string_lossy().into_owned();

    if text == LONG_FLAG || text == SHORT_FLAG {
      if args
        .peek()
        .is_some_and(|next| !next.to_string_lossy().starts_with('-'))
      {
        args.next();
      }
      continue;
    }

    if text.starts_with("--venv=") || (text.starts_with(SHORT_FLAG) && text.len() > 2) {
      continue;
    }

    res.push(arg);
  }

  res
}

/// Everything needed to restart the program inside another environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relaunch {
  pub root: PathBuf,
  pub interpreter: PathBuf,
  pub bin_dir: PathBuf,
  pub path: OsString,
}

/// Decides whether the program must restart inside `root`.
///
/// `marker` is the current value of [`MARKER_VAR`]. Returns `None` when it
/// already names `root`, so a relaunched process never relaunches again.
pub fn plan_relaunch(root: impl AsRef<Path>, marker: Option<&OsStr>) -> Result<Option<Relaunch>> {
  let root = root.as_ref();
  let interpreter = find_interpreter(root)?;

  if marker.is_some_and(|m| Path::new(m) == root) {
    tracing::debug!(root = ?root, "Already inside the requested environment");
    return Ok(None);
  }

  let bin_dir = interpreter
    .parent()
    .map(Path::to_path_buf)
    .unwrap_or_else(|| root.to_path_buf());

  let current = env::var_os("PATH").unwrap_or_default();
  let path = env::join_paths(std::iter::once(bin_dir.clone()).chain(env::split_paths(&current)))
    .unwrap_or(current);

  Ok(Some(Relaunch {
    root: root.to_path_buf(),
    interpreter,
    bin_dir,
    path,
  }))
}

impl Relaunch {
  fn command(&self, args: &[OsString]) -> Result<Command> {
    let exe = env::current_exe().map_err(Error::io("<current executable>"))?;

    let mut cmd = Command::new(exe);
    cmd
      .args(args)
      .env(MARKER_VAR, &self.root)
      .env("PATH", &self.path);
    Ok(cmd)
  }

  /// Replaces the current process with the same program running inside the
  /// environment. Only returns on failure.
  #[cfg(unix)]
  pub fn exec(&self, args: &[OsString]) -> Result<i32> {
    use std::os::unix::process::CommandExt;

    let mut cmd = self.command(args)?;
    tracing::info!(interpreter = ?self.interpreter, "Relaunching inside environment");
    tracing::debug!("» {}", render(&cmd));

    let source = cmd.exec();
    Err(Error::Spawn {
      program: render(&cmd),
      source,
    })
  }

  /// Runs the same program inside the environment as a child process and
  /// returns its exit code.
  #[cfg(not(unix))]
  pub fn exec(&self, args: &[OsString]) -> Result<i32> {
    let mut cmd = self.command(args)?;
    tracing::info!(interpreter = ?self.interpreter, "Relaunching inside environment");
    tracing::debug!("» {}", render(&cmd));

    let status = cmd.status().map_err(|source| Error::Spawn {
      program: render(&cmd),
      source,
    })?;
    Ok(status.code().unwrap_or(1))
  }
}
