use std::{
  ffi::OsString,
  fs,
  path::{Path, PathBuf},
  process::Command,
};

use crate::error::{Error, Result};
use crate::plan::{Chunk, ChunkPlan};
use crate::process::run;

pub const FOREGROUND_FILE: &str = "vocals.wav";
pub const BACKGROUND_FILE: &str = "accompaniment.wav";

pub trait Separator {
  /// Separates `chunk` of `input`, writing the stems under `out_dir`.
  fn separate(&self, input: &Path, chunk: &Chunk, out_dir: &Path) -> Result<()>;
}

/// Runs `<interpreter> -m spleeter separate` for each chunk.
#[derive(Debug, Clone)]
pub struct Spleeter {
  interpreter: OsString,
  model: String,
}

impl Spleeter {
  pub fn new(interpreter: impl Into<OsString>, model: impl Into<String>) -> Self {
    Self {
      interpreter: interpreter.into(),
      model: model.into(),
    }
  }

  fn command(&self, input: &Path, chunk: &Chunk, out_dir: &Path) -> Command {
    let mut cmd = Command::new(&self.interpreter);
    cmd
      .args(["-m", "spleeter", "separate", "-p", self.model.as_str()])
      .arg("--offset")
      .arg(chunk.offset.to_string())
      .arg("-d")
      .arg(chunk.duration.to_string())
      .arg("-o")
      .arg(out_dir)
      .arg(input);
    cmd
  }
}

impl Separator for Spleeter {
  fn separate(&self, input: &Path, chunk: &Chunk, out_dir: &Path) -> Result<()> {
    run(&mut self.command(input, chunk, out_dir))
  }
}

/// Which separator outputs must exist before a chunk counts as done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StemCheck {
  /// Only the foreground stem is checked; the background one is trusted to
  /// sit next to it.
  ForegroundOnly,
  #[default]
  Both,
}

/// Per-chunk stem paths, in chunk order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StemParts {
  pub foreground: Vec<PathBuf>,
  pub background: Vec<PathBuf>,
}

/// Directory the separator writes a chunk's stems into: a subdirectory of
/// the chunk directory named after the input's file stem.
pub fn stem_dir(chunk_dir: &Path, input: &Path) -> PathBuf {
  match input.file_stem() {
    Some(stem) => chunk_dir.join(stem),
    None => chunk_dir.to_path_buf(),
  }
}

/// Separates every chunk of `plan` in order, stopping at the first failure.
/// `on_chunk` runs before each chunk is handed to the separator.
pub fn separate_all<S: Separator + ?Sized>(
  separator: &S,
  input: &Path,
  plan: &ChunkPlan,
  tmp_root: &Path,
  check: StemCheck,
  mut on_chunk: impl FnMut(&Chunk),
) -> Result<StemParts> {
  let mut parts = StemParts::default();

  for chunk in plan.chunks() {
    on_chunk(&chunk);

    let chunk_dir = tmp_root.join(format!("chunk{}", chunk.index));
    fs::create_dir_all(&chunk_dir).map_err(Error::io(&chunk_dir))?;

    tracing::info!(
      chunk = chunk.index + 1,
      total = plan.count(),
      offset = chunk.offset,
      "Separating..."
    );

    separator.separate(input, &chunk, &chunk_dir)?;

    let dir = stem_dir(&chunk_dir, input);
    let foreground = dir.join(FOREGROUND_FILE);
    let background = dir.join(BACKGROUND_FILE);

    if !foreground.is_file() {
      return Err(Error::MissingStem(foreground));
    }
    if check == StemCheck::Both && !background.is_file() {
      return Err(Error::MissingStem(background));
    }

    parts.foreground.push(foreground);
    parts.background.push(background);
  }

  Ok(parts)
}
