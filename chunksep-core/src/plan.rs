use crate::error::{Error, Result};

/// A fixed-size window of the input, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
  pub index: usize,
  pub offset: u64,
  pub duration: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
  chunk_secs: u32,
  count: usize,
}

impl ChunkPlan {
  pub fn new(duration: f64, chunk_secs: u32) -> Result<Self> {
    if chunk_secs == 0 {
      return Err(Error::InvalidChunkSize);
    }

    if !duration.is_finite() || duration <= 0.0 {
      return Err(Error::ProbeOutput(format!("{duration} seconds")));
    }

    let count = (duration / f64::from(chunk_secs)).ceil() as usize;

    Ok(Self { chunk_secs, count })
  }

  pub fn chunk_secs(&self) -> u32 {
    self.chunk_secs
  }

  pub fn count(&self) -> usize {
    self.count
  }

  /// Chunks in temporal order. The last one may extend past the end of the
  /// input; the separator clamps it.
  pub fn chunks(&self) -> impl Iterator<Item = Chunk> + '_ {
    let secs = u64::from(self.chunk_secs);
    (0..self.count).map(move |index| Chunk {
      index,
      offset: index as u64 * secs,
      duration: secs,
    })
  }
}
