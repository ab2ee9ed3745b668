//! Lifting implementation of the CDF 9/7 wavelet.
//!
//! One decomposition level de-interleaves the working range into even and odd
//! halves, applies four lifting updates with alternating edge padding, then
//! scales the halves into low and high band. The inverse runs the same steps
//! backwards with negated coefficients.

const H1: f64 = -1.586_134_342_069_364_8;
const H2: f64 = -0.052_980_118_571_885_6;
const H3: f64 = 0.882_911_075_541_187_5;
const H4: f64 = 0.443_506_852_051_114_2;
const SCALE: f64 = 1.149_604_398_860_241_8;

/// `out[i] += h * (src[i-1] + src[i])`, with the first sample doubled in
/// place of the missing left neighbor.
fn lift(out: &mut [f64], src: &[f64], h: f64) {
    out[0] += h * 2.0 * src[0];
    for i in 1..out.len() {
        out[i] += h * (src[i - 1] + src[i]);
    }
}

/// `out[i] += h * (src[i] + src[i+1])`, with the last sample doubled in
/// place of the missing right neighbor.
fn lift_shift(out: &mut [f64], src: &[f64], h: f64) {
    let last = out.len() - 1;
    for i in 0..last {
        out[i] += h * (src[i] + src[i + 1]);
    }
    out[last] += h * 2.0 * src[last];
}

/// Forward transform over `levels` decomposition levels.
///
/// The result holds the coarsest band in the lowest indices, with each
/// following band doubling in size.
pub fn dwt(input: &[f64], levels: usize) -> Vec<f64> {
    let mut buf = input.to_vec();
    let mut n = buf.len();

    for _ in 0..levels {
        let half = n / 2;
        let mut x0: Vec<f64> = buf[..n].iter().step_by(2).copied().collect();
        let mut x1: Vec<f64> = buf[1..n].iter().step_by(2).copied().collect();

        lift_shift(&mut x1, &x0, H1);
        lift(&mut x0, &x1, H2);
        lift_shift(&mut x1, &x0, H3);
        lift(&mut x0, &x1, H4);

        for i in 0..half {
            buf[i] = x0[i] * SCALE;
            buf[half + i] = -x1[i] / SCALE;
        }
        n = half;
    }
    buf
}

/// Inverse transform; undoes [`dwt`] up to numerical error.
pub fn inv_dwt(input: &[f64], levels: usize) -> Vec<f64> {
    let mut buf = input.to_vec();
    let mut n = buf.len() >> (levels - 1);

    for _ in 0..levels {
        let half = n / 2;
        let mut x0: Vec<f64> = buf[..half].iter().map(|&v| v / SCALE).collect();
        let mut x1: Vec<f64> = buf[half..n].iter().map(|&v| -v * SCALE).collect();

        lift(&mut x0, &x1, -H4);
        lift_shift(&mut x1, &x0, -H3);
        lift(&mut x0, &x1, -H2);
        lift_shift(&mut x1, &x0, -H1);

        for i in 0..half {
            buf[2 * i] = x0[i];
            buf[2 * i + 1] = x1[i];
        }
        n *= 2;
    }
    buf
}
