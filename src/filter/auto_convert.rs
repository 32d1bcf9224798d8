//! Wraps a child filter: if the child declares a different input format
//! than it was actually opened with, inserts a `Convert` stage in front
//! rather than forcing every filter to handle arbitrary input formats.
//!
//! Transcribed from
//! `original_source/src/filter/plugins/AutoConvertFilterPlugin.cxx`.

use crate::audio_format::AudioFormat;
use crate::error::EngineError;
use crate::filter::{Filter, PreparedConvert, PreparedFilter, TwoFilters};

pub struct PreparedAutoConvert {
    filter: Box<dyn PreparedFilter>,
}

impl PreparedAutoConvert {
    pub fn new(filter: Box<dyn PreparedFilter>) -> Self {
        PreparedAutoConvert { filter }
    }
}

impl PreparedFilter for PreparedAutoConvert {
    fn open(&mut self, in_format: &mut AudioFormat) -> Result<Box<dyn Filter>, EngineError> {
        let requested = *in_format;
        let mut child_format = requested;
        let child = self.filter.open(&mut child_format)?;

        if requested == child_format {
            return Ok(child);
        }

        let mut convert = PreparedConvert::new(child_format);
        let convert_filter = convert.open(in_format)?;
        Ok(Box::new(TwoFilters::new(convert_filter, child)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_format::SampleFormat;
    use crate::filter::PreparedVolume;

    #[test]
    fn passthrough_when_child_accepts_input_as_is() {
        let mut prepared = PreparedAutoConvert::new(Box::new(PreparedVolume::new()));
        let mut af = AudioFormat::new(44100, SampleFormat::S16, 2);
        let opened = prepared.open(&mut af).unwrap();
        assert_eq!(opened.out_audio_format(), af);
    }
}
