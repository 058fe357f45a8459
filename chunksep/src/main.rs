mod cli;
mod setup;

use std::{env, process::ExitCode};

use anyhow::{Context, Result};
use clap::Parser;
use chunksep_core::{
  pipeline::Tools,
  separate::StemCheck,
  venv::{plan_relaunch, strip_venv_args, MARKER_VAR},
  Job,
};

use cli::Cli;
use setup::{resolve_python, setup_tracing};

fn main() -> ExitCode {
  let args = Cli::parse();

  setup_tracing(args.verbose);

  match run(args) {
    Ok(code) => code,
    Err(err) => {
      tracing::error!("{err:#}");
      ExitCode::FAILURE
    }
  }
}

fn run(args: Cli) -> Result<ExitCode> {
  if let Some(venv) = &args.venv {
    let marker = env::var_os(MARKER_VAR);
    let relaunch =
      plan_relaunch(venv, marker.as_deref()).context("Failed to prepare the environment")?;

    if let Some(relaunch) = relaunch {
      let forwarded = strip_venv_args(env::args_os().skip(1));
      let code = relaunch.exec(&forwarded).context("Failed to relaunch")?;
      return Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)));
    }
  }

  let python = resolve_python(&args);
  tracing::debug!(python = ?python, model = args.model, "Using separator");

  let job = Job {
    input: args.input,
    output_dir: args.output_dir,
    chunk_secs: args.chunk,
    keep_temp: args.keep_temp,
    stem_check: if args.check_foreground_only {
      StemCheck::ForegroundOnly
    } else {
      StemCheck::Both
    },
  };

  let tools = Tools {
    ffprobe: args.ffprobe,
    ffmpeg: args.ffmpeg,
    python,
    model: args.model,
  };
  let pipeline = tools.into_pipeline();

  let outputs = pipeline
    .run(&job)
    .with_context(|| format!("Failed to process `{}`", job.input.display()))?;

  tracing::info!("Finished");
  tracing::info!(" • {}", outputs.vocals.display());
  tracing::info!(" • {}", outputs.accompaniment.display());

  Ok(ExitCode::SUCCESS)
}
