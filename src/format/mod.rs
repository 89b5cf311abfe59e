//! Sample format utilities: channel matching and sample rate conversion.

pub mod convert;
pub mod resample;

pub use convert::{match_channels, mono_to_stereo};
pub use resample::resample;
