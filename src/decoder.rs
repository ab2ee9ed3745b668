//! Stream decoder.
//!
//! Walks the framing fields, hands every non-empty block payload to the
//! SPIHT/arithmetic back end, rescales the integers and runs the inverse
//! wavelet transform. Truncation is handled per the framing contract: a
//! remainder too short for a block is taken as end of stream.

use crate::coding::spiht::SpihtDecoder;
use crate::constants::{dwt_levels, MAXCHANNELS_DEFAULT, MIN_SIZE};
use crate::error::{CodecError, Result};
use crate::utils::bits::read_bits;
use crate::utils::math::ceil_log2;
use crate::wavelet::inv_dwt;

pub struct Decoder {
    channelbits: usize,
    spiht: SpihtDecoder,
    bl: usize,
    dwtlevel: usize,
    lengthbits: usize,
    fs: Option<u32>,
}

impl Decoder {
    /// Create a decoder expecting at most `max_channels` channels; must match
    /// the encoder's setting for multichannel streams.
    pub fn new(max_channels: usize) -> Self {
        Self {
            channelbits: ceil_log2(max_channels + 1),
            spiht: SpihtDecoder::new(),
            bl: 0,
            dwtlevel: 0,
            lengthbits: 0,
            fs: None,
        }
    }

    /// Sampling rate from the last decoded stream, if the header carried a
    /// known code.
    pub fn sampling_rate(&self) -> Option<u32> {
        self.fs
    }

    /// Decode a single-channel stream of unpacked bits.
    pub fn decode_1d(&mut self, bits: &[u8]) -> Result<Vec<f64>> {
        self.spiht.reset_counters();
        let mut pos = 0;
        self.fs = decode_sampling_rate(bits, &mut pos)?;

        let mut sig = Vec::new();
        while bits.len() - pos > MIN_SIZE {
            if !self.decode_block_length_code(bits, &mut pos) {
                break;
            }
            match self.decode_block(bits, &mut pos) {
                Some(block) => sig.extend(inv_dwt(&block, self.dwtlevel)),
                None => break,
            }
        }
        Ok(sig)
    }

    /// Decode a multichannel stream; one block per channel per time stride.
    /// An incomplete final stride is dropped.
    pub fn decode_md(&mut self, bits: &[u8]) -> Result<Vec<Vec<f64>>> {
        let mut pos = 0;
        if bits.len() < self.channelbits {
            return Err(CodecError::TruncatedStream("missing channel count"));
        }
        let channels = read_bits(bits, pos, self.channelbits) as usize;
        pos += self.channelbits;

        self.spiht.reset_counters();
        self.fs = decode_sampling_rate(bits, &mut pos)?;

        let mut sig: Vec<Vec<f64>> = vec![Vec::new(); channels];
        if channels == 0 {
            return Ok(sig);
        }

        'strides: while bits.len() - pos > MIN_SIZE {
            let mut stride = Vec::with_capacity(channels);
            for _ in 0..channels {
                if !self.decode_block_length_code(bits, &mut pos) {
                    break 'strides;
                }
                match self.decode_block(bits, &mut pos) {
                    Some(block) => stride.push(inv_dwt(&block, self.dwtlevel)),
                    None => break 'strides,
                }
            }
            for (channel, block) in sig.iter_mut().zip(stride) {
                channel.extend(block);
            }
        }
        Ok(sig)
    }

    /// Read one block-length prefix code and set the per-block state.
    /// Returns false when the remaining bits cannot hold a code.
    fn decode_block_length_code(&mut self, bits: &[u8], pos: &mut usize) -> bool {
        let remaining = bits.len() - *pos;
        let (bl, lengthbits) = if remaining >= 1 && bits[*pos] == 1 {
            *pos += 1;
            (32, 10)
        } else if remaining >= 2 && bits[*pos + 1] == 1 {
            *pos += 2;
            (64, 11)
        } else if remaining >= 3 && bits[*pos + 2] == 1 {
            *pos += 3;
            (128, 12)
        } else if remaining >= 4 {
            let code = if bits[*pos + 3] == 0 { (256, 13) } else { (512, 14) };
            *pos += 4;
            code
        } else {
            return false;
        };

        self.bl = bl;
        self.dwtlevel = dwt_levels(bl);
        self.lengthbits = lengthbits;
        true
    }

    /// Decode one block body into wavelet-domain samples. `None` means the
    /// stream ended inside the block.
    fn decode_block(&mut self, bits: &[u8], pos: &mut usize) -> Option<Vec<f64>> {
        if bits.len() - *pos < self.lengthbits {
            return None;
        }
        let segmentlength = read_bits(bits, *pos, self.lengthbits) as usize;
        *pos += self.lengthbits;

        if segmentlength == 0 {
            return Some(vec![0.0; self.bl]);
        }
        if bits.len() - *pos < segmentlength {
            return None;
        }

        let mut intquant = vec![0i32; self.bl];
        let side = self
            .spiht
            .decode(bits, *pos, segmentlength, &mut intquant, self.dwtlevel);
        *pos += segmentlength;

        let multiplicator = side.wavmax / (1u32 << side.bitmax) as f64;
        Some(intquant.iter().map(|&v| v as f64 * multiplicator).collect())
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(MAXCHANNELS_DEFAULT)
    }
}

fn decode_sampling_rate(bits: &[u8], pos: &mut usize) -> Result<Option<u32>> {
    if bits.len() - *pos < 2 {
        return Err(CodecError::TruncatedStream("missing sampling-rate code"));
    }
    let code = (bits[*pos], bits[*pos + 1]);
    *pos += 2;
    Ok(match code {
        (0, 0) => Some(8000),
        (0, 1) => Some(2800),
        (1, 0) => Some(2500),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stream_is_an_error() {
        let mut dec = Decoder::new(8);
        assert!(dec.decode_1d(&[]).is_err());
    }

    #[test]
    fn sampling_rate_codes() {
        let mut pos = 0;
        assert_eq!(decode_sampling_rate(&[0, 0], &mut pos).unwrap(), Some(8000));
        let mut pos = 0;
        assert_eq!(decode_sampling_rate(&[0, 1], &mut pos).unwrap(), Some(2800));
        let mut pos = 0;
        assert_eq!(decode_sampling_rate(&[1, 0], &mut pos).unwrap(), Some(2500));
        let mut pos = 0;
        assert_eq!(decode_sampling_rate(&[1, 1], &mut pos).unwrap(), None);
    }

    #[test]
    fn block_length_codes() {
        let mut dec = Decoder::new(8);
        let mut pos = 0;
        assert!(dec.decode_block_length_code(&[1], &mut pos));
        assert_eq!((dec.bl, dec.lengthbits, pos), (32, 10, 1));

        let mut pos = 0;
        assert!(dec.decode_block_length_code(&[0, 1], &mut pos));
        assert_eq!((dec.bl, dec.lengthbits, pos), (64, 11, 2));

        let mut pos = 0;
        assert!(dec.decode_block_length_code(&[0, 0, 1], &mut pos));
        assert_eq!((dec.bl, dec.lengthbits, pos), (128, 12, 3));

        let mut pos = 0;
        assert!(dec.decode_block_length_code(&[0, 0, 0, 0], &mut pos));
        assert_eq!((dec.bl, dec.lengthbits, pos), (256, 13, 4));

        let mut pos = 0;
        assert!(dec.decode_block_length_code(&[0, 0, 0, 1], &mut pos));
        assert_eq!((dec.bl, dec.lengthbits, pos), (512, 14, 4));
    }

    #[test]
    fn truncated_code_stops_cleanly() {
        let mut dec = Decoder::new(8);
        let mut pos = 0;
        assert!(!dec.decode_block_length_code(&[0, 0, 0], &mut pos));
    }

    #[test]
    fn all_zero_stream_decodes_to_silence() {
        // fs = 2800, one 32-sample empty block.
        let mut bits = vec![0, 1, 1];
        bits.extend_from_slice(&[0; 10]);
        let mut dec = Decoder::new(8);
        let sig = dec.decode_1d(&bits).unwrap();
        assert_eq!(sig, vec![0.0; 32]);
        assert_eq!(dec.sampling_rate(), Some(2800));
    }

    #[test]
    fn truncated_payload_is_end_of_stream() {
        // One 32-block claiming a 100-bit payload, but only 20 bits present.
        let mut bits = vec![0, 1, 1];
        let mut length_field = Vec::new();
        crate::utils::bits::push_bits(100, 10, &mut length_field);
        bits.extend_from_slice(&length_field);
        bits.extend_from_slice(&[1; 20]);
        let mut dec = Decoder::new(8);
        let sig = dec.decode_1d(&bits).unwrap();
        assert!(sig.is_empty());
    }
}
