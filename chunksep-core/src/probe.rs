use std::{ffi::OsString, path::Path, process::Command};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::process::run_captured;

pub trait Probe {
  /// Total duration of `input` in seconds.
  fn duration(&self, input: &Path) -> Result<f64>;
}

/// Duration probe backed by `ffprobe`.
#[derive(Debug, Clone)]
pub struct FfProbe {
  program: OsString,
}

impl FfProbe {
  pub fn new(program: impl Into<OsString>) -> Self {
    Self {
      program: program.into(),
    }
  }
}

impl Default for FfProbe {
  fn default() -> Self {
    Self::new("ffprobe")
  }
}

impl Probe for FfProbe {
  #[tracing::instrument(skip(self))]
  fn duration(&self, input: &Path) -> Result<f64> {
    let output = run_captured(
      Command::new(&self.program)
        .args(["-v", "error", "-show_entries", "format=duration", "-of", "json"])
        .arg(input),
    )?;

    parse_duration(&output.stdout)
  }
}

#[derive(Deserialize)]
struct ProbeReport {
  format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeFormat {
  duration: Option<Seconds>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Seconds {
  Text(String),
  Number(f64),
}

/// Extracts `format.duration` from ffprobe's JSON output.
pub fn parse_duration(json: &[u8]) -> Result<f64> {
  let report: ProbeReport =
    serde_json::from_slice(json).map_err(|err| Error::ProbeOutput(err.to_string()))?;

  let seconds = report
    .format
    .and_then(|f| f.duration)
    .ok_or_else(|| Error::ProbeOutput("no `format.duration` entry".into()))?;

  let value = match seconds {
    Seconds::Number(v) => v,
    Seconds::Text(s) => s
      .trim()
      .parse::<f64>()
      .map_err(|_| Error::ProbeOutput(format!("`{s}` is not a number")))?,
  };

  if !value.is_finite() || value <= 0.0 {
    return Err(Error::ProbeOutput(format!("{value} seconds")));
  }

  Ok(value)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_string_duration() {
    let json = br#"{ "format": { "duration": "1234.500000" } }"#;
    assert_eq!(parse_duration(json).unwrap(), 1234.5);
  }

  #[test]
  fn parses_numeric_duration() {
    let json = br#"{"format":{"duration":900}}"#;
    assert_eq!(parse_duration(json).unwrap(), 900.0);
  }

  #[test]
  fn rejects_missing_duration() {
    assert!(matches!(
      parse_duration(br#"{"format":{}}"#),
      Err(Error::ProbeOutput(_))
    ));
    assert!(matches!(
      parse_duration(br#"{}"#),
      Err(Error::ProbeOutput(_))
    ));
  }

  #[test]
  fn rejects_garbage() {
    assert!(matches!(
      parse_duration(b"Duration: 00:15:00"),
      Err(Error::ProbeOutput(_))
    ));
    assert!(matches!(
      parse_duration(br#"{"format":{"duration":"N/A"}}"#),
      Err(Error::ProbeOutput(_))
    ));
  }

  #[test]
  fn rejects_empty_audio() {
    assert!(matches!(
      parse_duration(br#"{"format":{"duration":"0.000000"}}"#),
      Err(Error::ProbeOutput(_))
    ));
  }

  #[cfg(unix)]
  #[test]
  fn failing_probe_propagates() {
    let probe = FfProbe::new("false");
    assert!(matches!(
      probe.duration(Path::new("in.wav")),
      Err(Error::ToolFailed { .. })
    ));
  }
}
