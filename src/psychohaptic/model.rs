//! Perceptual analysis of a signal block.
//!
//! The model rates each wavelet subband by how much quantization noise it can
//! hide: a DCT-II log spectrum is compared against a global masking threshold
//! built from the tactile perception threshold plus a quadratic mask around
//! every prominent spectral peak.

use std::sync::Arc;

use rustdct::DctPlanner;

use super::peaks::{find_peaks, Peak};
use crate::constants::{band_boundaries, dwt_levels};
use crate::utils::math::max_value;

const MIN_PEAK_PROMINENCE: f64 = 12.0;
const MIN_HEIGHT_DIFF: f64 = 45.0;

// Perception threshold curve tuning.
const THR_A: f64 = 62.0;
const THR_C: f64 = 1.0 / 550.0;
const THR_B: f64 = 1.0 - 250.0 * THR_C;
const THR_E: f64 = 77.0;

// Peak mask tuning.
const PEAK_A: f64 = 5.0;
const PEAK_B: f64 = 1400.0;
const PEAK_C: f64 = 30.0;

/// Per-band analysis result.
pub struct BlockAnalysis {
    /// Signal-to-mask ratio in dB per subband.
    pub smr: Vec<f64>,
    /// Linear-domain signal energy per subband.
    pub bandenergy: Vec<f64>,
}

/// Signal-independent state of the model for one `(bl, fs)` pair.
pub struct PsychohapticModel {
    bl: usize,
    book_cumulative: Vec<usize>,
    freqs: Vec<f64>,
    percthres: Vec<f64>,
    dct: Arc<dyn rustdct::TransformType2And3<f64>>,
}

impl PsychohapticModel {
    pub fn new(bl: usize, fs: u32) -> Self {
        let levels = dwt_levels(bl);
        let book_cumulative = band_boundaries(bl, levels);

        // Frequency grid from 0 to fs/2 over bl bins.
        let step = fs as f64 / (2 * bl - 1) as f64;
        let freqs: Vec<f64> = (0..bl).map(|i| i as f64 * step).collect();
        let percthres = perceptual_threshold(&freqs);

        let dct = DctPlanner::new().plan_dct2(bl);

        Self {
            bl,
            book_cumulative,
            freqs,
            percthres,
            dct,
        }
    }

    /// Analyze one time-domain block of length `bl`.
    pub fn analyze(&self, block: &[f64]) -> BlockAnalysis {
        let spect = self.spectrum(block);
        let globalmask = self.global_masking_threshold(&spect);

        let bands = self.book_cumulative.len() - 1;
        let mut smr = vec![0.0; bands];
        let mut bandenergy = vec![0.0; bands];
        for b in 0..bands {
            let mut maskenergy = 0.0;
            for i in self.book_cumulative[b]..self.book_cumulative[b + 1] {
                bandenergy[b] += 10f64.powf(spect[i] / 10.0);
                maskenergy += globalmask[i];
            }
            smr[b] = 10.0 * (bandenergy[b] / maskenergy).log10();
        }
        BlockAnalysis { smr, bandenergy }
    }

    /// Log-magnitude DCT-II spectrum of `block` in dB, orthonormal scaling.
    fn spectrum(&self, block: &[f64]) -> Vec<f64> {
        let mut buf = block.to_vec();
        self.dct.process_dct2(&mut buf);

        let n = self.bl as f64;
        let mut spect = Vec::with_capacity(self.bl);
        spect.push(20.0 * (buf[0].abs() / n.sqrt()).log10());
        let factor = (2.0 / n).sqrt();
        for &v in &buf[1..] {
            spect.push(20.0 * (v.abs() * factor).log10());
        }
        spect
    }

    /// Combine perception threshold and peak masks, in the linear domain.
    fn global_masking_threshold(&self, spect: &[f64]) -> Vec<f64> {
        let min_peak_height = max_value(spect) - MIN_HEIGHT_DIFF;
        let peaks = find_peaks(spect, MIN_PEAK_PROMINENCE, min_peak_height);
        match self.peak_mask(&peaks) {
            None => self.percthres.clone(),
            Some(mask) => mask
                .iter()
                .zip(&self.percthres)
                .map(|(&m, &t)| 10f64.powf(m / 10.0) + t)
                .collect(),
        }
    }

    /// Pointwise maximum of the quadratic masks of all peaks, in dB.
    fn peak_mask(&self, peaks: &[Peak]) -> Option<Vec<f64>> {
        let first = peaks.first()?;
        let mut mask = Vec::with_capacity(self.bl);

        let f = self.freqs[first.location];
        let offset = first.height - PEAK_A + (PEAK_A / PEAK_B) * f;
        let factor = -PEAK_C / (f * f);
        for &fi in &self.freqs {
            mask.push(offset + factor * (fi - f) * (fi - f));
        }
        for peak in &peaks[1..] {
            let f = self.freqs[peak.location];
            let offset = peak.height - PEAK_A + (PEAK_A / PEAK_B) * f;
            let factor = -PEAK_C / (f * f);
            for (m, &fi) in mask.iter_mut().zip(&self.freqs) {
                let val = offset + factor * (fi - f) * (fi - f);
                if val > *m {
                    *m = val;
                }
            }
        }
        Some(mask)
    }
}

/// Tactile perception threshold per frequency bin, linear domain, capped at 1
/// from the first bin that reaches it.
fn perceptual_threshold(freqs: &[f64]) -> Vec<f64> {
    let temp = THR_A / THR_B.log10().powi(2);
    let at = |f: f64| {
        let v = (temp * (THR_C * f + THR_B).log10().powi(2)).abs();
        10f64.powf((v - THR_E) / 10.0)
    };

    let mut thres = Vec::with_capacity(freqs.len());
    for &f in freqs {
        let v = at(f);
        if v >= 1.0 {
            thres.push(1.0);
            thres.resize(freqs.len(), 1.0);
            break;
        }
        thres.push(v);
    }
    thres
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_dips_near_pacinian_resonance() {
        let model = PsychohapticModel::new(512, 2800);
        // 250 Hz is the most sensitive point of the curve.
        let step: f64 = 2800.0 / 1023.0;
        let bin_250 = (250.0 / step).round() as usize;
        assert!(model.percthres[bin_250] < model.percthres[10]);
        assert!(model.percthres[bin_250] < 1e-6);
        // High frequencies are capped at 1.
        assert_eq!(model.percthres[511], 1.0);
    }

    #[test]
    fn threshold_cap_is_monotone_tail() {
        let model = PsychohapticModel::new(256, 8000);
        let first_capped = model.percthres.iter().position(|&v| v == 1.0).unwrap();
        assert!(model.percthres[first_capped..].iter().all(|&v| v == 1.0));
    }

    #[test]
    fn sinusoid_yields_highest_smr_in_its_band() {
        let bl = 512;
        let fs = 2800;
        let model = PsychohapticModel::new(bl, fs);
        let block: Vec<f64> = (0..bl)
            .map(|i| (2.0 * std::f64::consts::PI * 250.0 * i as f64 / fs as f64).sin())
            .collect();
        let analysis = model.analyze(&block);
        assert_eq!(analysis.smr.len(), 8);
        assert_eq!(analysis.bandenergy.len(), 8);

        // The 250 Hz tone lands in a low band; its band energy dominates.
        let max_band = analysis
            .bandenergy
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert!(max_band <= 4, "tone energy found in band {max_band}");
    }

    #[test]
    fn mixed_tones_produce_finite_smr() {
        let bl = 64;
        let fs = 2500;
        let model = PsychohapticModel::new(bl, fs);
        let block: Vec<f64> = (0..bl)
            .map(|i| {
                let t = i as f64 / fs as f64;
                1e-4 * (2.0 * std::f64::consts::PI * 180.0 * t).sin()
                    + 3e-5 * (2.0 * std::f64::consts::PI * 700.0 * t).cos()
                    + 1e-5
            })
            .collect();
        let analysis = model.analyze(&block);
        assert!(analysis.smr.iter().all(|v| v.is_finite()));
    }
}
