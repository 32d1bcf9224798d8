//! The filter pipeline: PCM-in-PCM-out stages composed into chains.
//!
//! Grounded on `original_source/src/filter/Filter.hxx` and `Prepared.hxx`.
//! The original's `FilterPCM` returns a `span` borrowed from an internal
//! buffer, valid only until the next call; that borrow shape doesn't
//! translate to a `&mut self` trait object in Rust without painful
//! lifetime gymnastics, so filters here return an owned `Vec<u8>` instead
//! (the cost is an extra copy per filter stage, accepted for the
//! simplicity of an ordinary trait-object chain).

pub mod auto_convert;
pub mod chain;
pub mod convert;
pub mod normalize;
pub mod replay_gain;
pub mod route;
pub mod two_filters;
pub mod volume;

pub use auto_convert::PreparedAutoConvert;
pub use chain::{Chain, PreparedChain};
pub use convert::{Convert, PreparedConvert};
pub use normalize::{Normalize, PreparedNormalize};
pub use replay_gain::{PreparedReplayGainFilter, ReplayGainFilter};
pub use route::{PreparedRoute, Route};
pub use two_filters::{PreparedTwoFilters, TwoFilters};
pub use volume::{PreparedVolume, Volume};

use crate::audio_format::AudioFormat;
use crate::error::EngineError;

/// A prepared-but-unopened filter stage: resolves its concrete input/output
/// format when [`open`](PreparedFilter::open) is called.
pub trait PreparedFilter: Send {
    /// Opens the filter against the given format. The filter may adjust
    /// `af` in place to declare the input format it actually requires
    /// (mirrors the original's `AudioFormat &af` out-parameter).
    fn open(&mut self, af: &mut AudioFormat) -> Result<Box<dyn Filter>, EngineError>;
}

/// An opened filter ready to process PCM.
pub trait Filter: Send {
    /// The format this filter emits from [`filter_pcm`](Filter::filter_pcm).
    fn out_audio_format(&self) -> AudioFormat;

    /// Drops any internal buffering (called on seek/cancel).
    fn reset(&mut self) {}

    /// Filters one block of PCM, in the format this filter was opened
    /// with, returning PCM in `out_audio_format()`.
    fn filter_pcm(&mut self, src: &[u8]) -> Result<Vec<u8>, EngineError>;

    /// Drains any residual tail samples buffered inside a stateful filter
    /// (resamplers, converters). Returns empty once fully drained.
    fn flush(&mut self) -> Result<Vec<u8>, EngineError> {
        Ok(Vec::new())
    }
}

/// Builds a prepared filter chaining `first` then `second`, unless one of
/// them is absent — mirrors `ChainFilters` in `TwoFilters.hxx`.
pub fn chain_filters(
    first: Option<Box<dyn PreparedFilter>>,
    second: Option<Box<dyn PreparedFilter>>,
) -> Option<Box<dyn PreparedFilter>> {
    match (first, second) {
        (Some(f), Some(s)) => Some(Box::new(PreparedTwoFilters::new(f, s))),
        (Some(f), None) => Some(f),
        (None, Some(s)) => Some(s),
        (None, None) => None,
    }
}
