//! 1-D SPIHT bit-plane coder.
//!
//! The coefficient tree is implicit over the flat block: the children of
//! index `i` are `2i` and `2i+1`. Three work lists drive the sorting pass:
//! LIP (insignificant coefficients), LIS (insignificant sets, type A = all
//! descendants, type B = grandchildren onward) and LSP (significant
//! coefficients). The encoder emits plain bits plus a context tag per bit;
//! the decoder pulls each bit through the arithmetic decoder because the
//! context of a bit only becomes known once all previous bits are decoded.

use log::warn;

use super::arith::ArithDecoder;
use super::context::Context;
use crate::constants::{
    FRACTIONPART_0, FRACTIONPART_1, MAXALLOCBITS_SIZE, MAX_BITS, WAVMAXLENGTH,
};
use crate::utils::bits::{bit_of, push_bits, read_bits};
use crate::utils::math::sgn_i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetKind {
    /// All descendants of the entry's coefficient.
    TypeA,
    /// Descendants of the entry's children.
    TypeB,
}

#[derive(Debug, Clone, Copy)]
struct SetEntry {
    index: usize,
    kind: SetKind,
}

/// Root band size for a block of `len` coefficients at `level` decomposition
/// levels: the two coarsest bands together.
fn root_band(len: usize, level: usize) -> usize {
    2 << (len.ilog2() as usize - level)
}

pub struct SpihtEncoder {
    /// Max magnitude over all descendants, per index.
    max_desc: Vec<i32>,
    /// Max magnitude over descendants of the children, per index.
    max_desc1: Vec<i32>,
}

impl SpihtEncoder {
    pub fn new() -> Self {
        Self {
            max_desc: Vec::new(),
            max_desc1: Vec::new(),
        }
    }

    /// Encode a quantized block.
    ///
    /// `wavmax_bits` is the already coded quantized-maximum side field;
    /// `maxallocbits` selects the first bit plane. Bits and their contexts
    /// are appended to `bits` / `contexts` one to one.
    pub fn encode(
        &mut self,
        data: &[i32],
        level: usize,
        wavmax_bits: &[u8],
        maxallocbits: usize,
        bits: &mut Vec<u8>,
        contexts: &mut Vec<Context>,
    ) {
        let mut maxallocbits = maxallocbits;
        if maxallocbits > (1 << MAXALLOCBITS_SIZE) - 1 {
            warn!("too many bits allocated: {maxallocbits}");
            maxallocbits = MAX_BITS;
        }
        push_bits(maxallocbits as u32, MAXALLOCBITS_SIZE, bits);
        bits.extend_from_slice(wavmax_bits);
        contexts.extend(std::iter::repeat(Context::Side).take(MAXALLOCBITS_SIZE + wavmax_bits.len()));

        let bandsize = root_band(data.len(), level);
        let mut lip: Vec<usize> = (0..bandsize).collect();
        let mut lis: Vec<SetEntry> = (bandsize / 2..bandsize)
            .map(|i| SetEntry {
                index: i,
                kind: SetKind::TypeA,
            })
            .collect();
        let mut lsp: Vec<usize> = Vec::new();

        self.init_max_descendants(data);

        for n in (0..=maxallocbits as u32).rev() {
            let compare = 1i32 << n;
            let lsp_len = lsp.len();
            self.sorting_pass(
                &mut lip, &mut lsp, &mut lis, compare, data, bits, contexts,
            );
            refinement_pass(&lsp, lsp_len, data, bits, contexts, n);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn sorting_pass(
        &self,
        lip: &mut Vec<usize>,
        lsp: &mut Vec<usize>,
        lis: &mut Vec<SetEntry>,
        compare: i32,
        data: &[i32],
        bits: &mut Vec<u8>,
        contexts: &mut Vec<Context>,
    ) {
        lip.retain(|&i| {
            let significant = data[i].abs() >= compare;
            bits.push(significant as u8);
            contexts.push(Context::Significance0);
            if significant {
                bits.push((data[i] >= 0) as u8);
                contexts.push(Context::Sign);
                lsp.push(i);
            }
            !significant
        });

        // Entries appended during the walk are visited in the same pass.
        let mut cursor = 0;
        while cursor < lis.len() {
            let entry = lis[cursor];
            match entry.kind {
                SetKind::TypeA => {
                    let significant = self.max_desc[entry.index] >= compare;
                    bits.push(significant as u8);
                    contexts.push(Context::Significance1);
                    if significant {
                        for child in [2 * entry.index, 2 * entry.index + 1] {
                            let child_significant = data[child].abs() >= compare;
                            bits.push(child_significant as u8);
                            contexts.push(Context::Significance2);
                            if child_significant {
                                bits.push((data[child] >= 0) as u8);
                                contexts.push(Context::Sign);
                                lsp.push(child);
                            } else {
                                lip.push(child);
                            }
                        }
                        if 4 * entry.index + 3 < data.len() {
                            lis.push(SetEntry {
                                index: entry.index,
                                kind: SetKind::TypeB,
                            });
                        }
                        lis.remove(cursor);
                    } else {
                        cursor += 1;
                    }
                }
                SetKind::TypeB => {
                    let significant = self.max_desc1[entry.index] >= compare;
                    bits.push(significant as u8);
                    contexts.push(Context::Significance3);
                    if significant {
                        lis.push(SetEntry {
                            index: 2 * entry.index,
                            kind: SetKind::TypeA,
                        });
                        lis.push(SetEntry {
                            index: 2 * entry.index + 1,
                            kind: SetKind::TypeA,
                        });
                        lis.remove(cursor);
                    } else {
                        cursor += 1;
                    }
                }
            }
        }
    }

    /// Bottom-up sweep filling `max_desc` and `max_desc1`.
    fn init_max_descendants(&mut self, data: &[i32]) {
        let start = data.len() >> 1;
        self.max_desc.clear();
        self.max_desc.resize(start, 0);
        self.max_desc1.clear();
        self.max_desc1.resize(start >> 1, 0);

        // Parents of leaves: descendants are exactly the two children.
        for target in start / 2..start {
            self.max_desc[target] = data[2 * target].abs().max(data[2 * target + 1].abs());
        }

        let mut width = start >> 1;
        while width >> 1 > 1 {
            for target in width / 2..width {
                let below = self.max_desc[2 * target].max(self.max_desc[2 * target + 1]);
                self.max_desc1[target] = below;
                self.max_desc[target] = below
                    .max(data[2 * target].abs())
                    .max(data[2 * target + 1].abs());
            }
            width >>= 1;
        }
    }
}

impl Default for SpihtEncoder {
    fn default() -> Self {
        Self::new()
    }
}

fn refinement_pass(
    lsp: &[usize],
    lsp_len: usize,
    data: &[i32],
    bits: &mut Vec<u8>,
    contexts: &mut Vec<Context>,
    n: u32,
) {
    for &i in &lsp[..lsp_len] {
        bits.push(bit_of(data[i], n));
        contexts.push(Context::Refinement);
    }
}

/// Side info recovered from the head of a block payload.
pub struct DecodedSideInfo {
    /// Rescaling maximum for the block.
    pub wavmax: f64,
    /// Number of bit planes minus one.
    pub bitmax: usize,
}

pub struct SpihtDecoder {
    arith: ArithDecoder,
}

impl SpihtDecoder {
    pub fn new() -> Self {
        Self {
            arith: ArithDecoder::new(),
        }
    }

    /// Reset the arithmetic contexts; once per stream.
    pub fn reset_counters(&mut self) {
        self.arith.reset();
    }

    /// Decode one block payload of `len` bits at `pos` into `out`.
    ///
    /// Arithmetic decoding happens bit by bit under SPIHT control. Ends with
    /// the per-block counter rescale.
    pub fn decode(
        &mut self,
        bits: &[u8],
        pos: usize,
        len: usize,
        out: &mut [i32],
        level: usize,
    ) -> DecodedSideInfo {
        self.arith.begin(bits, pos, len);
        out.fill(0);

        let mut header = vec![0u8; MAXALLOCBITS_SIZE];
        self.pull_bits(bits, &mut header, Context::Side);
        let bitmax = read_bits(&header, 0, MAXALLOCBITS_SIZE) as usize;

        let mode = self.pull_bit(bits, Context::Side);
        let mut value_bits = vec![0u8; WAVMAXLENGTH - 1];
        self.pull_bits(bits, &mut value_bits, Context::Side);
        let value = read_bits(&value_bits, 0, WAVMAXLENGTH - 1) as f64;
        let wavmax = if mode == 0 {
            value * 2f64.powi(-(FRACTIONPART_0 as i32))
        } else {
            value * 2f64.powi(-(FRACTIONPART_1 as i32)) + 1.0
        };

        let bandsize = root_band(out.len(), level);
        let mut lip: Vec<usize> = (0..bandsize).collect();
        let mut lis: Vec<SetEntry> = (bandsize / 2..bandsize)
            .map(|i| SetEntry {
                index: i,
                kind: SetKind::TypeA,
            })
            .collect();
        let mut lsp: Vec<usize> = Vec::new();

        for n in (0..=bitmax as u32).rev() {
            let compare = 1i32 << n;
            let lsp_len = lsp.len();
            self.sorting_pass(bits, &mut lip, &mut lsp, &mut lis, compare, out);
            self.refinement_pass(bits, &lsp, lsp_len, compare, out);
        }

        self.arith.rescale();
        DecodedSideInfo { wavmax, bitmax }
    }

    fn sorting_pass(
        &mut self,
        bits: &[u8],
        lip: &mut Vec<usize>,
        lsp: &mut Vec<usize>,
        lis: &mut Vec<SetEntry>,
        compare: i32,
        out: &mut [i32],
    ) {
        let mut kept = Vec::with_capacity(lip.len());
        for &i in lip.iter() {
            if self.pull_bit(bits, Context::Significance0) == 1 {
                out[i] = if self.pull_bit(bits, Context::Sign) == 1 {
                    compare
                } else {
                    -compare
                };
                lsp.push(i);
            } else {
                kept.push(i);
            }
        }
        *lip = kept;

        let mut cursor = 0;
        while cursor < lis.len() {
            let entry = lis[cursor];
            match entry.kind {
                SetKind::TypeA => {
                    if self.pull_bit(bits, Context::Significance1) == 1 {
                        for child in [2 * entry.index, 2 * entry.index + 1] {
                            if self.pull_bit(bits, Context::Significance2) == 1 {
                                out[child] = if self.pull_bit(bits, Context::Sign) == 1 {
                                    compare
                                } else {
                                    -compare
                                };
                                lsp.push(child);
                            } else {
                                lip.push(child);
                            }
                        }
                        if 4 * entry.index + 3 < out.len() {
                            lis.push(SetEntry {
                                index: entry.index,
                                kind: SetKind::TypeB,
                            });
                        }
                        lis.remove(cursor);
                    } else {
                        cursor += 1;
                    }
                }
                SetKind::TypeB => {
                    if self.pull_bit(bits, Context::Significance3) == 1 {
                        lis.push(SetEntry {
                            index: 2 * entry.index,
                            kind: SetKind::TypeA,
                        });
                        lis.push(SetEntry {
                            index: 2 * entry.index + 1,
                            kind: SetKind::TypeA,
                        });
                        lis.remove(cursor);
                    } else {
                        cursor += 1;
                    }
                }
            }
        }
    }

    fn refinement_pass(
        &mut self,
        bits: &[u8],
        lsp: &[usize],
        lsp_len: usize,
        compare: i32,
        out: &mut [i32],
    ) {
        for &i in &lsp[..lsp_len] {
            if self.pull_bit(bits, Context::Refinement) == 1 {
                out[i] += sgn_i32(out[i]) * compare;
            }
        }
    }

    fn pull_bit(&mut self, bits: &[u8], ctx: Context) -> u8 {
        self.arith.decode_bit(bits, ctx)
    }

    fn pull_bits(&mut self, bits: &[u8], out: &mut [u8], ctx: Context) {
        for b in out.iter_mut() {
            *b = self.arith.decode_bit(bits, ctx);
        }
    }
}

impl Default for SpihtDecoder {
    fn default() -> Self {
        Self::new()
    }
}
