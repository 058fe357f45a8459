use std::{env, path::PathBuf};

use chunksep_core::venv::{find_interpreter, MARKER_VAR};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::cli::Cli;

pub fn setup_tracing(verbose: bool) {
  let subscriber = FmtSubscriber::builder()
    .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
    .with_target(false)
    .finish();

  tracing::subscriber::set_global_default(subscriber).expect("Setting default subscriber failed");
}

/// Interpreter used to run Spleeter: the explicit one, else the active
/// environment's, else whatever `python3` resolves to.
pub fn resolve_python(args: &Cli) -> PathBuf {
  if let Some(python) = &args.python {
    return python.clone();
  }

  if let Some(active) = env::var_os(MARKER_VAR) {
    match find_interpreter(&active) {
      Ok(python) => return python,
      Err(err) => tracing::warn!(%err, "Ignoring active environment"),
    }
  }

  PathBuf::from("python3")
}
