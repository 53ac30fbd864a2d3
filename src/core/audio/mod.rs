//! Audio framing utilities.
//!
//! The bridge relays raw PCM from the upstream provider; the only audio
//! processing it performs is wrapping a finished turn's PCM in a WAV
//! container so browsers can play it directly.

pub mod wav;

pub use wav::{DEFAULT_BYTES_PER_SAMPLE, DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE, encode_wav};
