//! Stream encoder.
//!
//! Splits the signal into blocks, transforms each block to the wavelet
//! domain, distributes the bit budget across subbands by mask-to-noise ratio,
//! quantizes, and hands the integer coefficients to the lossless back end
//! (SPIHT + arithmetic coding). Framing fields are written around every block
//! so the decoder can recover block boundaries independently.

use log::warn;

use crate::coding::arith::ArithEncoder;
use crate::coding::spiht::SpihtEncoder;
use crate::constants::{
    band_boundaries, dwt_levels, length_bits, FRACTIONPART_0, FRACTIONPART_1, INTEGERPART_0,
    INTEGERPART_1, MAXCHANNELS_DEFAULT, MAX_BITS, WAVMAXLENGTH,
};
use crate::error::{CodecError, Result};
use crate::psychohaptic::model::{BlockAnalysis, PsychohapticModel};
use crate::quant::{max_quant, uniform_quant_band};
use crate::utils::bits::{push_bits, write_bits_at};
use crate::utils::math::{all_zero, ceil_log2, max_abs, min_index};
use crate::wavelet::dwt;

pub struct Encoder {
    bl: usize,
    fs: u32,
    dwtlevel: usize,
    /// Per-band sizes, coarsest first.
    book: Vec<usize>,
    /// Cumulative band boundaries, `book.len() + 1` entries.
    book_cumulative: Vec<usize>,
    channelbits: usize,
    lengthbits: usize,
    spiht: SpihtEncoder,
    arith: ArithEncoder,
    model: PsychohapticModel,
}

impl Encoder {
    /// Create an encoder for blocks of `bl` samples at `fs` Hz.
    ///
    /// `max_channels` sizes the channel-count header field of multichannel
    /// streams; decoding must use the same value.
    pub fn new(bl: usize, fs: u32, max_channels: usize) -> Result<Self> {
        let lengthbits = length_bits(bl).ok_or(CodecError::UnsupportedBlockLength(bl))?;
        let dwtlevel = dwt_levels(bl);
        let book_cumulative = band_boundaries(bl, dwtlevel);
        let book = book_cumulative.windows(2).map(|w| w[1] - w[0]).collect();

        Ok(Self {
            bl,
            fs,
            dwtlevel,
            book,
            book_cumulative,
            channelbits: ceil_log2(max_channels + 1),
            lengthbits,
            spiht: SpihtEncoder::new(),
            arith: ArithEncoder::new(),
            model: PsychohapticModel::new(bl, fs),
        })
    }

    /// Create an encoder with the default channel capacity.
    pub fn with_defaults(bl: usize, fs: u32) -> Result<Self> {
        Self::new(bl, fs, MAXCHANNELS_DEFAULT)
    }

    pub fn block_length(&self) -> usize {
        self.bl
    }

    /// Encode a single-channel signal into an unpacked bit sequence.
    ///
    /// The signal is zero-padded to whole blocks. `bitbudget` is the number
    /// of quantizer bits distributed across the subbands of each block.
    pub fn encode_1d(&mut self, sig: &[f64], bitbudget: usize) -> Vec<u8> {
        let bitbudget = self.clamped_budget(bitbudget);
        self.arith.reset();

        let mut bitstream = Vec::new();
        self.encode_sampling_rate(&mut bitstream);

        let numblocks = sig.len().div_ceil(self.bl);
        let mut padded = sig.to_vec();
        padded.resize(numblocks * self.bl, 0.0);

        for block in padded.chunks_exact(self.bl) {
            self.encode_block_length_code(&mut bitstream);
            let wavelets = dwt(block, self.dwtlevel);
            let analysis = self.model.analyze(block);
            self.encode_block(&wavelets, &analysis, bitbudget, &mut bitstream);
        }
        bitstream
    }

    /// Encode a multichannel signal, one block from every channel per time
    /// stride.
    ///
    /// All channels are padded (or cut) to the length of the first one. Fails
    /// if the channel count does not fit the header field.
    pub fn encode_md(&mut self, sig: &[Vec<f64>], bitbudget: usize) -> Result<Vec<u8>> {
        let channels = sig.len();
        if channels == 0 {
            return Err(CodecError::InvalidInput("no channels to encode".into()));
        }
        let bitbudget = self.clamped_budget(bitbudget);
        self.arith.reset();

        let mut bitstream = Vec::new();
        self.encode_channels(channels, &mut bitstream)?;
        self.encode_sampling_rate(&mut bitstream);

        let numblocks = sig[0].len().div_ceil(self.bl);
        let padded: Vec<Vec<f64>> = sig
            .iter()
            .map(|ch| {
                let mut ch = ch.clone();
                ch.resize(numblocks * self.bl, 0.0);
                ch
            })
            .collect();

        for b in 0..numblocks {
            let range = b * self.bl..(b + 1) * self.bl;
            let per_channel: Vec<(Vec<f64>, BlockAnalysis)> = padded
                .iter()
                .map(|ch| {
                    let block = &ch[range.clone()];
                    (dwt(block, self.dwtlevel), self.model.analyze(block))
                })
                .collect();

            for (wavelets, analysis) in &per_channel {
                self.encode_block_length_code(&mut bitstream);
                self.encode_block(wavelets, analysis, bitbudget, &mut bitstream);
            }
        }
        Ok(bitstream)
    }

    /// Encode one wavelet-domain block: payload-length field plus payload,
    /// or the zero length field alone for a silent block.
    fn encode_block(
        &mut self,
        wavelets: &[f64],
        analysis: &BlockAnalysis,
        bitbudget: usize,
        bitstream: &mut Vec<u8>,
    ) {
        if all_zero(wavelets) {
            // Empty block: a zero length field and no payload.
            push_bits(0, self.lengthbits, bitstream);
            return;
        }

        let (qwavmax, wavmax_bits) = quantized_wavelet_maximum(wavelets);
        let (quantized, bitalloc) = self.allocate_bits(wavelets, analysis, qwavmax, bitbudget);

        let bitmax = bitalloc.iter().copied().max().unwrap_or(0);
        let multiplicator = (1u32 << bitmax) as f64 / qwavmax;
        let intquant: Vec<i32> = quantized
            .iter()
            .map(|&q| (q * multiplicator).round() as i32)
            .collect();

        self.lossless_encode(&intquant, &wavmax_bits, bitmax, bitstream);
    }

    /// Distribute `bitbudget` quantizer bits over the subbands, greedily
    /// raising whichever band has the worst mask-to-noise ratio.
    fn allocate_bits(
        &self,
        wavelets: &[f64],
        analysis: &BlockAnalysis,
        qwavmax: f64,
        bitbudget: usize,
    ) -> (Vec<f64>, Vec<usize>) {
        let bands = self.book.len();
        let last = bands - 1;
        let mut quantized = vec![0.0; self.bl];
        let mut bitalloc = vec![0usize; bands];
        let mut allocated = 0usize;

        let mut noise: Vec<f64> = (0..bands)
            .map(|b| self.band_noise(wavelets, &quantized, b))
            .collect();
        let mut mnr = vec![0.0; bands];

        while allocated < bitbudget {
            for b in 0..bands {
                let snr = 10.0 * (analysis.bandenergy[b] / noise[b]).log10();
                mnr[b] = snr - analysis.smr[b];
                if bitalloc[b] >= MAX_BITS {
                    mnr[b] = f64::INFINITY;
                }
            }
            let index = min_index(&mnr);

            if allocated - bitalloc[last] >= MAX_BITS * self.dwtlevel {
                // Every other band is saturated; give the last band the whole
                // remainder and finish.
                let previous = bitalloc[last];
                bitalloc[last] = bitbudget - MAX_BITS * self.dwtlevel;
                allocated += bitalloc[last] - previous;
            } else {
                bitalloc[index] += 1;
                allocated += 1;
            }

            uniform_quant_band(
                wavelets,
                &mut quantized,
                self.book_cumulative[index],
                self.book[index],
                qwavmax,
                bitalloc[index] as u32,
            );
            noise[index] = self.band_noise(wavelets, &quantized, index);
        }

        (quantized, bitalloc)
    }

    fn band_noise(&self, wavelets: &[f64], quantized: &[f64], band: usize) -> f64 {
        (self.book_cumulative[band]..self.book_cumulative[band + 1])
            .map(|i| (wavelets[i] - quantized[i]).powi(2))
            .sum()
    }

    /// SPIHT + arithmetic coding of the integer block, then the length field
    /// and payload.
    fn lossless_encode(
        &mut self,
        intquant: &[i32],
        wavmax_bits: &[u8],
        bitmax: usize,
        bitstream: &mut Vec<u8>,
    ) {
        let mut spiht_bits = Vec::new();
        let mut spiht_contexts = Vec::new();
        self.spiht.encode(
            intquant,
            self.dwtlevel,
            wavmax_bits,
            bitmax,
            &mut spiht_bits,
            &mut spiht_contexts,
        );

        let mut payload = self.arith.encode(&spiht_bits, &spiht_contexts);
        self.arith.rescale();

        let max_size = (1usize << self.lengthbits) - 1;
        if payload.len() > max_size {
            warn!(
                "block payload of {} bits exceeds the {}-bit length field, truncating",
                payload.len(),
                self.lengthbits
            );
            payload.truncate(max_size);
        }
        push_bits(payload.len() as u32, self.lengthbits, bitstream);
        bitstream.extend_from_slice(&payload);
    }

    fn clamped_budget(&self, bitbudget: usize) -> usize {
        let ceiling = MAX_BITS * self.book.len();
        if bitbudget > ceiling {
            warn!("bit budget {bitbudget} too high, clamping to {ceiling}");
            ceiling
        } else {
            bitbudget
        }
    }

    fn encode_sampling_rate(&self, bitstream: &mut Vec<u8>) {
        let code: [u8; 2] = match self.fs {
            8000 => [0, 0],
            2800 => [0, 1],
            2500 => [1, 0],
            _ => [1, 1],
        };
        bitstream.extend_from_slice(&code);
    }

    fn encode_channels(&self, channels: usize, bitstream: &mut Vec<u8>) -> Result<()> {
        let capacity = (1usize << self.channelbits) - 1;
        if channels > capacity {
            return Err(CodecError::TooManyChannels {
                got: channels,
                max: capacity,
            });
        }
        push_bits(channels as u32, self.channelbits, bitstream);
        Ok(())
    }

    fn encode_block_length_code(&self, bitstream: &mut Vec<u8>) {
        let code: &[u8] = match self.bl {
            32 => &[1],
            64 => &[0, 1],
            128 => &[0, 0, 1],
            256 => &[0, 0, 0, 0],
            _ => &[0, 0, 0, 1],
        };
        bitstream.extend_from_slice(code);
    }
}

/// Quantize the block's absolute maximum into the 8-bit side field.
///
/// Maxima below 1 use a pure fraction split (mode 0); larger maxima spend
/// three integer bits and are offset by 1 (mode 1). Rounding is always
/// upward so rescaling at the decoder never clips.
fn quantized_wavelet_maximum(wavelets: &[f64]) -> (f64, Vec<u8>) {
    let wavmax = max_abs(wavelets);

    let (integerpart, integer_bits, fraction_bits, mode) = if wavmax < 1.0 {
        (0.0, INTEGERPART_0, FRACTIONPART_0, 0u8)
    } else {
        (1.0, INTEGERPART_1, FRACTIONPART_1, 1u8)
    };

    let qwavmax = max_quant(wavmax - integerpart, integer_bits, fraction_bits) + integerpart;

    let mut bits = vec![0u8; WAVMAXLENGTH];
    bits[0] = mode;
    let value = ((qwavmax - integerpart) * 2f64.powi(fraction_bits as i32)) as u32;
    write_bits_at(value, (integer_bits + fraction_bits) as usize, &mut bits, 1);
    (qwavmax, bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::bits::read_bits;

    fn sine_block(bl: usize, fs: u32, freq: f64) -> Vec<f64> {
        (0..bl)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / fs as f64).sin())
            .collect()
    }

    #[test]
    fn rejects_unsupported_block_length() {
        assert!(Encoder::new(48, 2800, 8).is_err());
        assert!(Encoder::new(512, 2800, 8).is_ok());
    }

    #[test]
    fn all_zero_signal_produces_only_framing() {
        let mut enc = Encoder::new(32, 2800, 8).unwrap();
        let bits = enc.encode_1d(&vec![0.0; 32], 40);
        // fs code (2) + block length code (1) + zero length field (10).
        assert_eq!(bits.len(), 2 + 1 + 10);
        assert_eq!(read_bits(&bits, 3, 10), 0);
    }

    #[test]
    fn too_many_channels_is_refused() {
        let mut enc = Encoder::new(64, 2800, 2).unwrap();
        let sig = vec![vec![0.0; 64]; 5];
        assert!(matches!(
            enc.encode_md(&sig, 40),
            Err(CodecError::TooManyChannels { .. })
        ));
    }

    #[test]
    fn encoding_is_deterministic() {
        let sig = sine_block(512, 2800, 250.0);
        let mut enc1 = Encoder::new(512, 2800, 8).unwrap();
        let mut enc2 = Encoder::new(512, 2800, 8).unwrap();
        assert_eq!(enc1.encode_1d(&sig, 120), enc2.encode_1d(&sig, 120));
    }

    #[test]
    fn saturated_budget_fills_every_band() {
        let bl = 32;
        let enc = Encoder::new(bl, 2800, 8).unwrap();
        let block = sine_block(bl, 2800, 200.0);
        let wavelets = dwt(&block, enc.dwtlevel);
        let analysis = enc.model.analyze(&block);
        let (qwavmax, _) = quantized_wavelet_maximum(&wavelets);
        let bands = enc.book.len();
        let (_, bitalloc) = enc.allocate_bits(&wavelets, &analysis, qwavmax, MAX_BITS * bands);
        assert!(bitalloc.iter().all(|&b| b == MAX_BITS), "{bitalloc:?}");
    }

    #[test]
    fn allocation_exhausts_the_budget() {
        let bl = 128;
        let enc = Encoder::new(bl, 2800, 8).unwrap();
        let block = sine_block(bl, 2800, 80.0);
        let wavelets = dwt(&block, enc.dwtlevel);
        let analysis = enc.model.analyze(&block);
        let (qwavmax, _) = quantized_wavelet_maximum(&wavelets);
        for budget in [1usize, 7, 30, 60] {
            let (_, bitalloc) = enc.allocate_bits(&wavelets, &analysis, qwavmax, budget);
            assert_eq!(bitalloc.iter().sum::<usize>(), budget);
            assert!(bitalloc.iter().all(|&b| b <= MAX_BITS));
        }
    }

    #[test]
    fn quantized_maximum_modes() {
        let (q, bits) = quantized_wavelet_maximum(&[0.37, -0.2]);
        assert_eq!(bits.len(), WAVMAXLENGTH);
        assert_eq!(bits[0], 0);
        assert!(q >= 0.37 && (q - 0.37) <= 2f64.powi(-7) + 1e-12);

        let (q, bits) = quantized_wavelet_maximum(&[2.5, -0.2]);
        assert_eq!(bits[0], 1);
        assert!(q >= 2.5 && (q - 2.5) <= 2f64.powi(-4) + 1e-12);
    }

    #[test]
    fn padding_covers_partial_blocks() {
        let mut enc = Encoder::new(64, 2800, 8).unwrap();
        let sig = sine_block(100, 2800, 150.0);
        let bits = enc.encode_1d(&sig, 50);
        assert!(!bits.is_empty());
        // Two blocks of framing at minimum: fs + 2 * (code + length field).
        assert!(bits.len() >= 2 + 2 * (2 + 11));
    }
}
