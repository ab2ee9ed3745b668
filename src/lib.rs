//! # vibcodec
//!
//! A perceptual lossy codec for vibrotactile (haptic) signals.
//!
//! One- or multi-channel waveforms are cut into power-of-two blocks, moved to
//! the wavelet domain, rated by a psychohaptic masking model, quantized under
//! a per-block bit budget, and coded losslessly with a SPIHT bit-plane coder
//! driving a context-adaptive binary arithmetic coder. The decoder recovers
//! the exact integer coefficients the encoder produced and reconstructs an
//! approximation of the input matched to tactile sensitivity.
//!
//! The library is organized into several modules:
//! - `utils`: bit packing and small numeric helpers
//! - `wavelet` / `quant`: signal transforms and quantizers
//! - `psychohaptic`: perceptual model and peak analysis
//! - `coding`: SPIHT and arithmetic coding back end
//! - `encoder` / `decoder`: stream-level codec with framing
//! - `interface`: file and folder front end

// Re-export commonly used types at the crate root
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{CodecError, Result};

pub mod constants;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod interface;

pub mod utils {
    pub mod bits;
    pub mod math;
}

pub mod psychohaptic {
    pub mod model;
    pub mod peaks;
}

pub mod coding {
    pub mod arith;
    pub mod context;
    pub mod spiht;
}

pub mod quant;
pub mod wavelet;
