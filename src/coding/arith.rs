//! Context-adaptive binary arithmetic coder.
//!
//! An integer range coder over 10-bit precision. The encoder consumes a whole
//! block's bits at once; the decoder runs bit-at-a-time because the caller
//! only learns the next context from the bits decoded so far. Both sides keep
//! their own [`Counters`] copy, which must stay bit-identical after every
//! block.

use super::context::{Context, Counters, FIRST_QTR, HALF, RANGE_MAX, THIRD_QTR};

/// Number of bits used to seed the decoder's working value.
const DIGITS_START: usize = 10;

pub struct ArithEncoder {
    counters: Counters,
}

impl ArithEncoder {
    pub fn new() -> Self {
        Self {
            counters: Counters::new(),
        }
    }

    /// Reset the context counters; once per stream.
    pub fn reset(&mut self) {
        self.counters.reset();
    }

    /// Rescale the context counters; once per block, after [`encode`].
    ///
    /// [`encode`]: ArithEncoder::encode
    pub fn rescale(&mut self) {
        self.counters.rescale();
    }

    /// Encode `bits` under the per-bit `contexts` into a fresh bit sequence.
    pub fn encode(&mut self, bits: &[u8], contexts: &[Context]) -> Vec<u8> {
        debug_assert_eq!(bits.len(), contexts.len());

        let mut out = Vec::with_capacity(bits.len());
        let mut lower = 0i32;
        let mut upper = RANGE_MAX;
        let mut bits_to_follow = 0u32;

        for (&bit, &ctx) in bits.iter().zip(contexts) {
            let add = self.counters.split(ctx, upper - lower);
            if bit == 0 {
                upper = lower + add;
            } else {
                lower += add;
            }

            loop {
                if upper <= HALF {
                    out.push(0);
                    for _ in 0..bits_to_follow {
                        out.push(1);
                    }
                    bits_to_follow = 0;
                } else if lower >= HALF {
                    out.push(1);
                    for _ in 0..bits_to_follow {
                        out.push(0);
                    }
                    bits_to_follow = 0;
                    lower -= HALF;
                    upper -= HALF;
                } else if lower >= FIRST_QTR && upper <= THIRD_QTR {
                    bits_to_follow += 1;
                    lower -= FIRST_QTR;
                    upper -= FIRST_QTR;
                } else {
                    break;
                }
                lower <<= 1;
                upper <<= 1;
            }

            self.counters.update(ctx, bit);
        }

        // Terminate: either one pending-carry 1, or the shortest value that
        // still lands inside [lower, upper).
        if bits_to_follow > 0 {
            out.push(1);
        } else {
            let mut val = HALF;
            while lower > 0 {
                if val < upper {
                    out.push(1);
                    lower -= val;
                    upper -= val;
                } else {
                    out.push(0);
                }
                val >>= 1;
            }
        }

        while out.last() == Some(&0) {
            out.pop();
        }
        out
    }
}

impl Default for ArithEncoder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ArithDecoder {
    counters: Counters,
    lower: i32,
    upper: i32,
    diff: i32,
    leading: i32,
    index: usize,
    end: usize,
}

impl ArithDecoder {
    pub fn new() -> Self {
        Self {
            counters: Counters::new(),
            lower: 0,
            upper: RANGE_MAX,
            diff: RANGE_MAX,
            leading: 0,
            index: 0,
            end: 0,
        }
    }

    pub fn reset(&mut self) {
        self.counters.reset();
    }

    pub fn rescale(&mut self) {
        self.counters.rescale();
    }

    /// Start decoding the `len` bits of `bits` beginning at `pos`.
    pub fn begin(&mut self, bits: &[u8], pos: usize, len: usize) {
        self.index = pos;
        self.end = pos + len;

        self.leading = 0;
        let mut shift = DIGITS_START - 1;
        for _ in 0..DIGITS_START.min(len) {
            self.leading += (bits[self.index] as i32) << shift;
            self.index += 1;
            shift = shift.wrapping_sub(1);
        }

        self.lower = 0;
        self.upper = RANGE_MAX;
        self.diff = RANGE_MAX;
    }

    /// Decode one bit under `ctx`. Past the block's bit range, zeros are
    /// pulled in, mirroring the encoder's trailing-zero strip.
    pub fn decode_bit(&mut self, bits: &[u8], ctx: Context) -> u8 {
        let add = self.counters.split(ctx, self.diff);
        let value = self.leading - self.lower;

        let bit = if value < add {
            self.upper = self.lower + add;
            0
        } else {
            self.lower += add;
            1
        };

        loop {
            if self.upper <= HALF {
                // No offset to remove in the lower half.
            } else if self.lower >= HALF {
                self.lower -= HALF;
                self.upper -= HALF;
                self.leading -= HALF;
            } else if self.lower >= FIRST_QTR && self.upper <= THIRD_QTR {
                self.lower -= FIRST_QTR;
                self.upper -= FIRST_QTR;
                self.leading -= FIRST_QTR;
            } else {
                break;
            }
            self.lower <<= 1;
            self.upper <<= 1;
            self.leading <<= 1;
            if self.index < self.end {
                self.leading += bits[self.index] as i32;
                self.index += 1;
            }
        }

        self.diff = self.upper - self.lower;
        self.counters.update(ctx, bit);
        bit
    }
}

impl Default for ArithDecoder {
    fn default() -> Self {
        Self::new()
    }
}
