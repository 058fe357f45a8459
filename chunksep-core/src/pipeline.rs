use std::{
  fmt, fs,
  path::{Path, PathBuf},
};

use tempfile::TempDir;

use crate::concat::{Concat, FfmpegConcat};
use crate::error::{Error, Result};
use crate::plan::ChunkPlan;
use crate::probe::{FfProbe, Probe};
use crate::separate::{separate_all, Separator, Spleeter, StemCheck};

pub const DEFAULT_CHUNK_SECS: u32 = 600;
pub const DEFAULT_MODEL: &str = "spleeter:2stems";
pub const TEMP_PREFIX: &str = "chunksep_";

/// One run over a single input file.
#[derive(Debug, Clone)]
pub struct Job {
  pub input: PathBuf,
  pub output_dir: PathBuf,
  pub chunk_secs: u32,
  pub keep_temp: bool,
  pub stem_check: StemCheck,
}

impl Job {
  pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
    Self {
      input: input.into(),
      output_dir: output_dir.into(),
      chunk_secs: DEFAULT_CHUNK_SECS,
      keep_temp: false,
      stem_check: StemCheck::default(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StemKind {
  Foreground,
  Background,
}

impl StemKind {
  pub fn suffix(&self) -> &'static str {
    match self {
      Self::Foreground => "vocals",
      Self::Background => "accompaniment",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Init,
  EnvironmentCheck,
  Probing,
  Planning,
  /// Index of the chunk being separated.
  Separating(usize),
  Concatenating(StemKind),
  Cleanup,
  Done,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Init => write!(f, "init"),
      Self::EnvironmentCheck => write!(f, "environment check"),
      Self::Probing => write!(f, "probing"),
      Self::Planning => write!(f, "planning"),
      Self::Separating(index) => write!(f, "separating chunk {index}"),
      Self::Concatenating(kind) => write!(f, "concatenating {}", kind.suffix()),
      Self::Cleanup => write!(f, "cleanup"),
      Self::Done => write!(f, "done"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outputs {
  pub vocals: PathBuf,
  pub accompaniment: PathBuf,
  /// Where the per-chunk directories were kept, when asked to keep them.
  pub kept_temp: Option<PathBuf>,
}

pub fn output_path(output_dir: &Path, input: &Path, kind: StemKind) -> PathBuf {
  let stem = input
    .file_stem()
    .map(|s| s.to_string_lossy())
    .unwrap_or_else(|| "output".into());
  output_dir.join(format!("{stem}_{}.wav", kind.suffix()))
}

pub struct Pipeline<P, S, C> {
  probe: P,
  separator: S,
  concat: C,
}

fn enter(stage: Stage) {
  tracing::debug!(%stage, "Entering stage");
}

impl<P: Probe, S: Separator, C: Concat> Pipeline<P, S, C> {
  pub fn new(probe: P, separator: S, concat: C) -> Self {
    Self {
      probe,
      separator,
      concat,
    }
  }

  pub fn run(&self, job: &Job) -> Result<Outputs> {
    enter(Stage::Init);

    enter(Stage::EnvironmentCheck);
    if !job.input.is_file() {
      return Err(Error::InputMissing(job.input.clone()));
    }
    let input = job.input.canonicalize().map_err(Error::io(&job.input))?;

    fs::create_dir_all(&job.output_dir).map_err(Error::io(&job.output_dir))?;
    let output_dir = job
      .output_dir
      .canonicalize()
      .map_err(Error::io(&job.output_dir))?;

    enter(Stage::Probing);
    let duration = self.probe.duration(&input)?;

    enter(Stage::Planning);
    let plan = ChunkPlan::new(duration, job.chunk_secs)?;
    tracing::info!(
      "Duration {duration:.2}s -> {} chunk(s) of {}s",
      plan.count(),
      plan.chunk_secs()
    );

    let tmp_root = TempRoot::create(job.keep_temp)?;

    let res = self.process(job, &input, &output_dir, &plan, tmp_root.path());
    if let TempRoot::Kept(dir) = &tmp_root {
      tracing::info!(dir = ?dir, "Chunks kept");
    }
    let (vocals, accompaniment) = res?;

    enter(Stage::Cleanup);
    let kept_temp = tmp_root.finish()?;

    enter(Stage::Done);
    Ok(Outputs {
      vocals,
      accompaniment,
      kept_temp,
    })
  }

  fn process(
    &self,
    job: &Job,
    input: &Path,
    output_dir: &Path,
    plan: &ChunkPlan,
    tmp_root: &Path,
  ) -> Result<(PathBuf, PathBuf)> {
    let parts = separate_all(
      &self.separator,
      input,
      plan,
      tmp_root,
      job.stem_check,
      |chunk| enter(Stage::Separating(chunk.index)),
    )?;

    let vocals = output_path(output_dir, input, StemKind::Foreground);
    let accompaniment = output_path(output_dir, input, StemKind::Background);

    enter(Stage::Concatenating(StemKind::Foreground));
    tracing::info!("Concatenating vocals...");
    self.concat.concat(&parts.foreground, &vocals)?;

    enter(Stage::Concatenating(StemKind::Background));
    tracing::info!("Concatenating accompaniment...");
    self.concat.concat(&parts.background, &accompaniment)?;

    Ok((vocals, accompaniment))
  }
}

/// Root of the per-chunk directories. A kept root survives every exit path,
/// failed runs included; a scoped one is removed when dropped.
enum TempRoot {
  Scoped(TempDir),
  Kept(PathBuf),
}

impl TempRoot {
  fn create(keep: bool) -> Result<Self> {
    let dir = tempfile::Builder::new()
      .prefix(TEMP_PREFIX)
      .tempdir()
      .map_err(Error::io(std::env::temp_dir()))?;

    Ok(if keep {
      Self::Kept(dir.keep())
    } else {
      Self::Scoped(dir)
    })
  }

  fn path(&self) -> &Path {
    match self {
      Self::Scoped(dir) => dir.path(),
      Self::Kept(path) => path,
    }
  }

  fn finish(self) -> Result<Option<PathBuf>> {
    match self {
      Self::Scoped(dir) => {
        let path = dir.path().to_path_buf();
        dir.close().map_err(Error::io(path))?;
        Ok(None)
      }
      Self::Kept(path) => Ok(Some(path)),
    }
  }
}

/// External programs and the separation model a run is carried out with.
#[derive(Debug, Clone)]
pub struct Tools {
  pub ffprobe: PathBuf,
  pub ffmpeg: PathBuf,
  pub python: PathBuf,
  pub model: String,
}

impl Default for Tools {
  fn default() -> Self {
    Self {
      ffprobe: PathBuf::from("ffprobe"),
      ffmpeg: PathBuf::from("ffmpeg"),
      python: PathBuf::from("python3"),
      model: DEFAULT_MODEL.to_owned(),
    }
  }
}

impl Tools {
  pub fn into_pipeline(self) -> Pipeline<FfProbe, Spleeter, FfmpegConcat> {
    Pipeline::new(
      FfProbe::new(self.ffprobe),
      Spleeter::new(self.python, self.model),
      FfmpegConcat::new(self.ffmpeg),
    )
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use tempfile::tempdir;

  use super::*;
  use crate::plan::Chunk;
  use crate::separate::{stem_dir, BACKGROUND_FILE, FOREGROUND_FILE};

  struct FixedDuration(f64);

  impl Probe for FixedDuration {
    fn duration(&self, _: &Path) -> Result<f64> {
      Ok(self.0)
    }
  }

  #[derive(Default)]
  struct RecordingSeparator {
    offsets: RefCell<Vec<u64>>,
    dirs: RefCell<Vec<PathBuf>>,
  }

  impl Separator for RecordingSeparator {
    fn separate(&self, input: &Path, chunk: &Chunk, out_dir: &Path) -> Result<()> {
      self.offsets.borrow_mut().push(chunk.offset);
      self.dirs.borrow_mut().push(out_dir.to_path_buf());
      let dir = stem_dir(out_dir, input);
      fs::create_dir_all(&dir).unwrap();
      fs::write(dir.join(FOREGROUND_FILE), format!("v{}", chunk.index)).unwrap();
      fs::write(dir.join(BACKGROUND_FILE), format!("a{}", chunk.index)).unwrap();
      Ok(())
    }
  }

  /// Concatenates by appending file contents, which is enough to check order.
  #[derive(Default)]
  struct ByteConcat {
    calls: RefCell<Vec<(PathBuf, usize)>>,
  }

  impl Concat for ByteConcat {
    fn concat(&self, parts: &[PathBuf], output: &Path) -> Result<()> {
      let mut joined = Vec::new();
      for p in parts {
        joined.extend(fs::read(p).map_err(Error::io(p))?);
      }
      fs::write(output, joined).map_err(Error::io(output))?;
      self
        .calls
        .borrow_mut()
        .push((output.to_path_buf(), parts.len()));
      Ok(())
    }
  }

  fn input_file(dir: &Path) -> PathBuf {
    let input = dir.join("concert.wav");
    fs::write(&input, b"RIFF").unwrap();
    input
  }

  #[test]
  fn fifteen_minutes_in_ten_minute_chunks() {
    let dir = tempdir().unwrap();
    let input = input_file(dir.path());
    let out = dir.path().join("out");

    let pipeline = Pipeline::new(
      FixedDuration(900.0),
      RecordingSeparator::default(),
      ByteConcat::default(),
    );
    let outputs = pipeline.run(&Job::new(&input, &out)).unwrap();

    assert_eq!(*pipeline.separator.offsets.borrow(), [0, 600]);

    let out = out.canonicalize().unwrap();
    assert_eq!(outputs.vocals, out.join("concert_vocals.wav"));
    assert_eq!(outputs.accompaniment, out.join("concert_accompaniment.wav"));
    assert_eq!(fs::read_to_string(&outputs.vocals).unwrap(), "v0v1");
    assert_eq!(fs::read_to_string(&outputs.accompaniment).unwrap(), "a0a1");

    let calls = pipeline.concat.calls.borrow();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|(_, n)| *n == 2));

    assert_eq!(outputs.kept_temp, None);
    let dirs = pipeline.separator.dirs.borrow();
    assert!(!dirs[0].exists());
  }

  #[test]
  fn keep_temp_preserves_chunks() {
    let dir = tempdir().unwrap();
    let input = input_file(dir.path());

    let pipeline = Pipeline::new(
      FixedDuration(30.0),
      RecordingSeparator::default(),
      ByteConcat::default(),
    );
    let mut job = Job::new(&input, dir.path().join("out"));
    job.chunk_secs = 10;
    job.keep_temp = true;

    let outputs = pipeline.run(&job).unwrap();
    let kept = outputs.kept_temp.expect("temp dir kept");

    for i in 0..3 {
      assert!(kept.join(format!("chunk{i}/concert/vocals.wav")).is_file());
    }
    fs::remove_dir_all(kept).unwrap();
  }

  #[test]
  fn missing_input_stops_before_probing() {
    struct NoProbe;
    impl Probe for NoProbe {
      fn duration(&self, _: &Path) -> Result<f64> {
        panic!("probe must not run");
      }
    }

    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(NoProbe, RecordingSeparator::default(), ByteConcat::default());
    let err = pipeline
      .run(&Job::new(dir.path().join("absent.wav"), dir.path()))
      .unwrap_err();

    assert!(matches!(err, Error::InputMissing(_)));
  }

  #[test]
  fn separation_failure_skips_concat() {
    struct Broken;
    impl Separator for Broken {
      fn separate(&self, _: &Path, _: &Chunk, _: &Path) -> Result<()> {
        Ok(())
      }
    }

    let dir = tempdir().unwrap();
    let input = input_file(dir.path());
    let pipeline = Pipeline::new(FixedDuration(900.0), Broken, ByteConcat::default());

    let err = pipeline
      .run(&Job::new(&input, dir.path().join("out")))
      .unwrap_err();

    assert!(matches!(err, Error::MissingStem(_)));
    assert!(pipeline.concat.calls.borrow().is_empty());
    assert!(!dir.path().join("out/concert_vocals.wav").exists());
  }

  /// Writes stems for the first chunk, then fails.
  #[derive(Default)]
  struct FailsAfterFirst {
    dirs: RefCell<Vec<PathBuf>>,
  }

  impl Separator for FailsAfterFirst {
    fn separate(&self, input: &Path, chunk: &Chunk, out_dir: &Path) -> Result<()> {
      self.dirs.borrow_mut().push(out_dir.to_path_buf());
      if chunk.index > 0 {
        return Err(Error::Spawn {
          program: "spleeter".into(),
          source: std::io::Error::other("out of memory"),
        });
      }
      let dir = stem_dir(out_dir, input);
      fs::create_dir_all(&dir).unwrap();
      fs::write(dir.join(FOREGROUND_FILE), "v0").unwrap();
      fs::write(dir.join(BACKGROUND_FILE), "a0").unwrap();
      Ok(())
    }
  }

  #[test]
  fn keep_temp_survives_failed_separation() {
    let dir = tempdir().unwrap();
    let input = input_file(dir.path());

    let pipeline = Pipeline::new(
      FixedDuration(900.0),
      FailsAfterFirst::default(),
      ByteConcat::default(),
    );
    let mut job = Job::new(&input, dir.path().join("out"));
    job.keep_temp = true;

    assert!(matches!(pipeline.run(&job), Err(Error::Spawn { .. })));

    let dirs = pipeline.separator.dirs.borrow();
    assert_eq!(dirs.len(), 2);
    assert!(dirs[0].join("concert/vocals.wav").is_file());
    assert!(dirs[0].join("concert/accompaniment.wav").is_file());
    assert!(pipeline.concat.calls.borrow().is_empty());

    let root = dirs[0].parent().unwrap();
    fs::remove_dir_all(root).unwrap();
  }

  #[test]
  fn failed_run_without_keep_temp_cleans_up() {
    let dir = tempdir().unwrap();
    let input = input_file(dir.path());

    let pipeline = Pipeline::new(
      FixedDuration(900.0),
      FailsAfterFirst::default(),
      ByteConcat::default(),
    );
    assert!(pipeline
      .run(&Job::new(&input, dir.path().join("out")))
      .is_err());

    let dirs = pipeline.separator.dirs.borrow();
    assert!(!dirs[0].exists());
  }

  #[test]
  fn scoped_temp_root_removed_on_drop() {
    let root = TempRoot::create(false).unwrap();
    let path = root.path().to_path_buf();
    assert!(path.is_dir());
    drop(root);
    assert!(!path.exists());
  }

  #[test]
  fn kept_temp_root_outlives_drop() {
    let root = TempRoot::create(true).unwrap();
    let path = root.path().to_path_buf();
    drop(root);
    assert!(path.is_dir());
    fs::remove_dir_all(path).unwrap();
  }

  #[test]
  fn stage_names_carry_chunk_index() {
    assert_eq!(Stage::Separating(2).to_string(), "separating chunk 2");
    assert_eq!(
      Stage::Concatenating(StemKind::Background).to_string(),
      "concatenating accompaniment"
    );
  }

  #[test]
  fn tools_build_the_external_pipeline() {
    let tools = Tools {
      python: PathBuf::from("/envs/sp/bin/python"),
      model: "spleeter:4stems".into(),
      ..Tools::default()
    };
    let pipeline = tools.into_pipeline();

    let separator = format!("{:?}", pipeline.separator);
    assert!(separator.contains("/envs/sp/bin/python"), "{separator}");
    assert!(separator.contains("spleeter:4stems"), "{separator}");
    assert!(format!("{:?}", pipeline.concat).contains("ffmpeg"));
  }

  #[test]
  fn output_names_follow_input_stem() {
    let path = output_path(
      Path::new("/out"),
      Path::new("/in/live.set.flac"),
      StemKind::Background,
    );
    assert_eq!(path, Path::new("/out/live.set_accompaniment.wav"));
  }
}
