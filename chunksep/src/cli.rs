use std::path::PathBuf;

use chunksep_core::pipeline::DEFAULT_MODEL;
use clap::Parser;

#[derive(Parser)]
#[command(version, disable_version_flag = true)]
#[command(
  about = "Run Spleeter over long audio in fixed-size chunks and join the stems",
  long_about = None
)]
pub struct Cli {
  #[arg(help = "Input audio file")]
  #[arg(value_name = "INPUT")]
  pub input: PathBuf,

  #[arg(short, long, help = "Chunk size in seconds")]
  #[arg(value_name = "SECONDS", default_value_t = 600)]
  #[arg(value_parser = clap::value_parser!(u32).range(1..))]
  pub chunk: u32,

  #[arg(long, help = "Spleeter model")]
  #[arg(value_name = "MODEL", default_value = DEFAULT_MODEL)]
  pub model: String,

  #[arg(short, long, help = "Final output directory")]
  #[arg(value_name = "DIR", default_value = "output")]
  pub output_dir: PathBuf,

  #[arg(long, help = "Keep per-chunk temp directories")]
  pub keep_temp: bool,

  #[arg(
    short = 'V',
    long,
    help = "Virtual environment to relaunch inside before doing anything"
  )]
  #[arg(value_name = "DIR")]
  pub venv: Option<PathBuf>,

  #[arg(long, help = "Only require the vocals stem after each separation")]
  pub check_foreground_only: bool,

  #[arg(long, env = "CHUNKSEP_FFPROBE", default_value = "ffprobe")]
  #[arg(value_name = "PROGRAM", help = "ffprobe executable")]
  pub ffprobe: PathBuf,

  #[arg(long, env = "CHUNKSEP_FFMPEG", default_value = "ffmpeg")]
  #[arg(value_name = "PROGRAM", help = "ffmpeg executable")]
  pub ffmpeg: PathBuf,

  #[arg(long, env = "CHUNKSEP_PYTHON")]
  #[arg(
    value_name = "PROGRAM",
    help = "Python interpreter running Spleeter [default: the active venv's, else python3]"
  )]
  pub python: Option<PathBuf>,

  #[arg(short, long, help = "Print debug logs")]
  pub verbose: bool,

  // `-V` belongs to `--venv`, so the version flag is long-only.
  #[allow(dead_code)]
  #[arg(long, action = clap::ArgAction::Version, help = "Print version")]
  version: Option<bool>,
}
