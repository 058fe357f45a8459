use std::{io, path::PathBuf, process::ExitStatus};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("environment directory `{0}` does not exist")]
  EnvRootMissing(PathBuf),

  #[error("could not find an interpreter under `{0}`")]
  InterpreterMissing(PathBuf),

  #[error("input file `{0}` not found")]
  InputMissing(PathBuf),

  #[error("chunk size must be a positive number of seconds")]
  InvalidChunkSize,

  #[error("failed to start `{program}`")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("command `{command}` failed with {status}")]
  ToolFailed { command: String, status: ExitStatus },

  #[error("unusable duration reported by the probe: {0}")]
  ProbeOutput(String),

  #[error("missing stem `{0}` after separation")]
  MissingStem(PathBuf),

  #[error("no parts to concatenate into `{0}`")]
  NothingToConcat(PathBuf),

  #[error("the path `{0}` is not valid UTF-8 and can not be listed for ffmpeg")]
  NonUtf8Path(PathBuf),

  #[error("I/O error on `{path}`")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl Error {
  pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
    let path = path.into();
    move |source| Self::Io { path, source }
  }
}

pub type Result<T> = ::std::result::Result<T, Error>;
