//! Sequential composition of two filters, with a format check at the seam.
//!
//! Transcribed from `original_source/src/filter/plugins/TwoFilters.{hxx,cxx}`.

use crate::audio_format::AudioFormat;
use crate::error::EngineError;
use crate::filter::{Filter, PreparedFilter};

pub struct TwoFilters {
    first: Box<dyn Filter>,
    second: Box<dyn Filter>,
}

impl TwoFilters {
    pub fn new(first: Box<dyn Filter>, second: Box<dyn Filter>) -> Self {
        TwoFilters { first, second }
    }
}

impl Filter for TwoFilters {
    fn out_audio_format(&self) -> AudioFormat {
        self.second.out_audio_format()
    }

    fn reset(&mut self) {
        self.first.reset();
        self.second.reset();
    }

    fn filter_pcm(&mut self, src: &[u8]) -> Result<Vec<u8>, EngineError> {
        let mid = self.first.filter_pcm(src)?;
        self.second.filter_pcm(&mid)
    }

    fn flush(&mut self) -> Result<Vec<u8>, EngineError> {
        let mut first_tail = self.first.flush()?;
        let mut out = if first_tail.is_empty() {
            Vec::new()
        } else {
            self.second.filter_pcm(&first_tail)?
        };
        first_tail.clear();
        let second_tail = self.second.flush()?;
        out.extend(second_tail);
        Ok(out)
    }
}

pub struct PreparedTwoFilters {
    first: Box<dyn PreparedFilter>,
    second: Box<dyn PreparedFilter>,
}

impl PreparedTwoFilters {
    pub fn new(first: Box<dyn PreparedFilter>, second: Box<dyn PreparedFilter>) -> Self {
        PreparedTwoFilters { first, second }
    }
}

impl PreparedFilter for PreparedTwoFilters {
    fn open(&mut self, af: &mut AudioFormat) -> Result<Box<dyn Filter>, EngineError> {
        let first = self.first.open(af)?;
        let mut mid = first.out_audio_format();
        let second = self.second.open(&mut mid)?;
        Ok(Box::new(TwoFilters::new(first, second)))
    }
}
