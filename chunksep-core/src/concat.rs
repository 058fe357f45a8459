use std::{
  ffi::OsString,
  fs,
  path::{Path, PathBuf},
  process::Command,
};

use crate::error::{Error, Result};
use crate::process::run;

pub trait Concat {
  /// Joins `parts` in order into `output`.
  fn concat(&self, parts: &[PathBuf], output: &Path) -> Result<()>;
}

/// Lossless concatenation through ffmpeg's concat demuxer.
#[derive(Debug, Clone)]
pub struct FfmpegConcat {
  program: OsString,
}

impl FfmpegConcat {
  pub fn new(program: impl Into<OsString>) -> Self {
    Self {
      program: program.into(),
    }
  }
}

impl Default for FfmpegConcat {
  fn default() -> Self {
    Self::new("ffmpeg")
  }
}

/// Removes the manifest when dropped, whichever way the concat went.
struct Manifest(PathBuf);

impl Manifest {
  fn write(path: PathBuf, parts: &[PathBuf]) -> Result<Self> {
    let text = render_manifest(parts)?;
    fs::write(&path, text).map_err(Error::io(&path))?;
    Ok(Self(path))
  }
}

impl Drop for Manifest {
  fn drop(&mut self) {
    if let Err(err) = fs::remove_file(&self.0) {
      tracing::warn!(%err, manifest = ?self.0, "Failed to remove concat manifest");
    }
  }
}

/// Concat demuxer input listing `parts` in order, one quoted entry per line.
/// The manifest is text, so every part must be valid UTF-8.
pub fn render_manifest(parts: &[PathBuf]) -> Result<String> {
  parts
    .iter()
    .map(|p| -> Result<String> {
      let mut path = p
        .to_str()
        .ok_or_else(|| Error::NonUtf8Path(p.clone()))?
        .to_owned();
      if cfg!(windows) {
        path = path.replace('\\', "/");
      }
      let path = path.replace('\'', r"'\''");
      Ok(format!("file '{path}'\n"))
    })
    .collect()
}

impl Concat for FfmpegConcat {
  #[tracing::instrument(skip_all, fields(output = ?output, parts = parts.len()))]
  fn concat(&self, parts: &[PathBuf], output: &Path) -> Result<()> {
    if parts.is_empty() {
      return Err(Error::NothingToConcat(output.to_path_buf()));
    }

    let manifest = Manifest::write(output.with_extension("txt"), parts)?;

    run(
      Command::new(&self.program)
        .args(["-y", "-f", "concat", "-safe", "0", "-i"])
        .arg(&manifest.0)
        .args(["-c", "copy"])
        .arg(output),
    )
  }
}
