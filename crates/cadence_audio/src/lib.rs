//! Cadence Audio
//!
//! WAV decoding and a software mixer. Sounds live in a
//! [`ResourceCache`](cadence_asset::ResourceCache); a playing voice holds its
//! handle so the sound stays loaded until the voice finishes.

pub mod mixer;
pub mod sound;

pub use mixer::{Mixer, DEFAULT_SAMPLE_RATE};
pub use sound::{AudioError, Sound};
