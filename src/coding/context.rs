//! Adaptive probability contexts shared by the arithmetic encoder and
//! decoder.
//!
//! Each context tracks `(zeros, total)` as the running zero-probability
//! estimate. Both sides must apply identical update, reset, and rescale rules
//! or the coded streams diverge.

/// Number of distinct contexts.
pub const CONTEXTS: usize = 7;

/// Range-coder precision.
pub const RANGE_MAX: i32 = 1024;
pub const HALF: i32 = 512;
pub const FIRST_QTR: i32 = 256;
pub const THIRD_QTR: i32 = 768;

/// Counter state at stream start.
pub const RESET: i32 = 16;
/// Counter total after the per-block rescale.
pub const RESIZE: i32 = 32;

/// Bit role, used to pick the probability context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Context {
    /// Header side info (`bitmax`, quantized maximum).
    Side = 0,
    /// Sign of a newly significant coefficient.
    Sign = 1,
    /// Significance of a list-of-insignificant-pixels entry.
    Significance0 = 2,
    /// Significance of a full descendant set.
    Significance1 = 3,
    /// Significance of a child coefficient.
    Significance2 = 4,
    /// Significance of a grandchildren-onward set.
    Significance3 = 5,
    /// Refinement bit of an already significant coefficient.
    Refinement = 6,
}

/// Per-context adaptive counters.
#[derive(Debug, Clone)]
pub struct Counters {
    zeros: [i32; CONTEXTS],
    total: [i32; CONTEXTS],
}

impl Counters {
    pub fn new() -> Self {
        let mut c = Self {
            zeros: [0; CONTEXTS],
            total: [0; CONTEXTS],
        };
        c.reset();
        c
    }

    /// Stream-start state: every context at probability 1/2.
    pub fn reset(&mut self) {
        self.zeros = [RESET / 2; CONTEXTS];
        self.total = [RESET; CONTEXTS];
    }

    /// End-of-block rescale so newer bits weigh more. Keeps every context
    /// strictly inside `0 < zeros < total`.
    pub fn rescale(&mut self) {
        for i in 0..CONTEXTS {
            let scaled =
                (self.zeros[i] as f64 / self.total[i] as f64 * RESIZE as f64).round() as i32;
            self.zeros[i] = scaled.max(1);
            self.total[i] = RESIZE;
        }
    }

    /// Width of the zero sub-range for the current interval width `range`.
    ///
    /// Quantizes the zero probability to `RANGE_MAX` steps first so encoder
    /// and decoder compute the identical split, then clamps so neither
    /// sub-range collapses.
    pub fn split(&self, ctx: Context, range: i32) -> i32 {
        let i = ctx as usize;
        let p = (self.zeros[i] as f64 / self.total[i] as f64 * RANGE_MAX as f64).round();
        let add = (range as f64 * p) as i32 / RANGE_MAX;
        add.clamp(1, range - 1)
    }

    /// Account for one coded bit. Must run after the bit is emitted or
    /// consumed, on both sides alike.
    pub fn update(&mut self, ctx: Context, bit: u8) {
        let i = ctx as usize;
        if bit == 0 {
            self.zeros[i] += 1;
        }
        self.total[i] += 1;
    }

    #[cfg(test)]
    pub fn state(&self, ctx: Context) -> (i32, i32) {
        (self.zeros[ctx as usize], self.total[ctx as usize])
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}
