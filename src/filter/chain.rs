//! A sequence of filters, always opened so the chain ends in a `Convert`
//! stage (spec §4.2) so the sink's output format can be retuned without
//! disturbing upstream filters.

use crate::audio_format::AudioFormat;
use crate::error::EngineError;
use crate::filter::{Filter, PreparedConvert, PreparedFilter};

pub struct Chain {
    stages: Vec<Box<dyn Filter>>,
    out_format: AudioFormat,
}

impl Filter for Chain {
    fn out_audio_format(&self) -> AudioFormat {
        self.out_format
    }

    fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }

    fn filter_pcm(&mut self, src: &[u8]) -> Result<Vec<u8>, EngineError> {
        let mut buf = src.to_vec();
        for stage in &mut self.stages {
            buf = stage.filter_pcm(&buf)?;
        }
        Ok(buf)
    }

    fn flush(&mut self) -> Result<Vec<u8>, EngineError> {
        // Drain each stage's tail through the rest of the chain in order.
        let mut out = Vec::new();
        for i in 0..self.stages.len() {
            let tail = self.stages[i].flush()?;
            let mut buf = tail;
            for stage in &mut self.stages[i + 1..] {
                buf = stage.filter_pcm(&buf)?;
            }
            out.extend(buf);
        }
        Ok(out)
    }
}

/// A chain builder: named templates are pushed in order, and `open` always
/// appends a final `Convert` to `output_format`.
pub struct PreparedChain {
    templates: Vec<Box<dyn PreparedFilter>>,
    output_format: AudioFormat,
}

impl PreparedChain {
    pub fn new(output_format: AudioFormat) -> Self {
        PreparedChain {
            templates: Vec::new(),
            output_format,
        }
    }

    pub fn push(&mut self, filter: Box<dyn PreparedFilter>) -> &mut Self {
        self.templates.push(filter);
        self
    }

    pub fn set_output_format(&mut self, format: AudioFormat) {
        self.output_format = format;
    }
}

impl PreparedFilter for PreparedChain {
    fn open(&mut self, af: &mut AudioFormat) -> Result<Box<dyn Filter>, EngineError> {
        let mut stages = Vec::with_capacity(self.templates.len() + 1);
        let mut current = *af;
        for template in &mut self.templates {
            let opened = template.open(&mut current)?;
            current = opened.out_audio_format();
            stages.push(opened);
        }
        let mut convert = PreparedConvert::new(self.output_format);
        let opened_convert = convert.open(&mut current)?;
        let out_format = opened_convert.out_audio_format();
        stages.push(opened_convert);
        Ok(Box::new(Chain {
            stages,
            out_format,
        }))
    }
}
