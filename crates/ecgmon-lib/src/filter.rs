//! Zero-phase Butterworth filtering.
//!
//! Designs are cascades of second-order sections obtained from the analog
//! prototype through a pre-warped bilinear transform. `filtfilt` runs the
//! cascade forward and backward over an odd-reflected, steady-state
//! initialised signal so the output has no phase shift and a DC input comes
//! back unchanged.

use crate::error::{MonitorError, Result};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Lowpass,
    Highpass,
}

/// Second-order section, `H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)`.
#[derive(Debug, Clone, Copy)]
struct Section {
    b: [f64; 3],
    a: [f64; 2],
}

impl Section {
    fn dc_gain(&self) -> f64 {
        (self.b[0] + self.b[1] + self.b[2]) / (1.0 + self.a[0] + self.a[1])
    }

    /// Direct Form II transposed, starting from the steady state for `data[0]`.
    fn run(&self, data: &mut [f64]) {
        let Some(&x0) = data.first() else {
            return;
        };
        let y0 = self.dc_gain() * x0;
        let mut s0 = y0 - self.b[0] * x0;
        let mut s1 = self.b[2] * x0 - self.a[1] * y0;
        for x in data.iter_mut() {
            let input = *x;
            let output = self.b[0] * input + s0;
            s0 = self.b[1] * input - self.a[0] * output + s1;
            s1 = self.b[2] * input - self.a[1] * output;
            *x = output;
        }
    }

    fn magnitude(&self, omega: f64) -> f64 {
        let (c1, s1) = (omega.cos(), -omega.sin());
        let (c2, s2) = ((2.0 * omega).cos(), -(2.0 * omega).sin());
        let num_re = self.b[0] + self.b[1] * c1 + self.b[2] * c2;
        let num_im = self.b[1] * s1 + self.b[2] * s2;
        let den_re = 1.0 + self.a[0] * c1 + self.a[1] * c2;
        let den_im = self.a[0] * s1 + self.a[1] * s2;
        (num_re.hypot(num_im)) / (den_re.hypot(den_im))
    }
}

/// Butterworth IIR filter stored as a cascade of sections.
#[derive(Debug, Clone)]
pub struct ButterworthFilter {
    sections: Vec<Section>,
    order: usize,
}

impl ButterworthFilter {
    pub fn lowpass(order: usize, cutoff_hz: f64, fs: f64) -> Result<Self> {
        validate(order, cutoff_hz, fs)?;
        Ok(Self {
            sections: design(order, cutoff_hz, fs, FilterKind::Lowpass),
            order,
        })
    }

    pub fn highpass(order: usize, cutoff_hz: f64, fs: f64) -> Result<Self> {
        validate(order, cutoff_hz, fs)?;
        Ok(Self {
            sections: design(order, cutoff_hz, fs, FilterKind::Highpass),
            order,
        })
    }

    /// Low-pass at `high_hz` cascaded with high-pass at `low_hz`.
    pub fn bandpass(order: usize, low_hz: f64, high_hz: f64, fs: f64) -> Result<Self> {
        validate(order, low_hz, fs)?;
        validate(order, high_hz, fs)?;
        if low_hz >= high_hz {
            return Err(MonitorError::FilterConfig(format!(
                "band-pass edges inverted: {} Hz >= {} Hz",
                low_hz, high_hz
            )));
        }
        let mut sections = design(order, high_hz, fs, FilterKind::Lowpass);
        sections.extend(design(order, low_hz, fs, FilterKind::Highpass));
        Ok(Self {
            sections,
            order: order * 2,
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Magnitude response at `freq_hz` for a single (causal) pass.
    pub fn gain_at(&self, freq_hz: f64, fs: f64) -> f64 {
        let omega = 2.0 * PI * freq_hz / fs;
        self.sections.iter().map(|s| s.magnitude(omega)).product()
    }

    /// Single causal pass.
    pub fn apply(&self, data: &[f64]) -> Vec<f64> {
        let mut out = data.to_vec();
        self.run_cascade(&mut out);
        out
    }

    /// Forward-backward pass with zero phase distortion.
    pub fn filtfilt(&self, data: &[f64]) -> Vec<f64> {
        let n = data.len();
        if n == 0 {
            return Vec::new();
        }
        let pad = (3 * (self.order + 1)).min(n - 1);
        let first = data[0];
        let last = data[n - 1];
        let mut ext = Vec::with_capacity(n + 2 * pad);
        ext.extend((1..=pad).rev().map(|i| 2.0 * first - data[i]));
        ext.extend_from_slice(data);
        ext.extend((n - 1 - pad..n - 1).rev().map(|i| 2.0 * last - data[i]));

        self.run_cascade(&mut ext);
        ext.reverse();
        self.run_cascade(&mut ext);
        ext.reverse();
        ext[pad..pad + n].to_vec()
    }

    fn run_cascade(&self, data: &mut [f64]) {
        for section in &self.sections {
            section.run(data);
        }
    }
}

/// Zero-phase low-pass filter; output has the same length as the input.
pub fn filter(amplitude: &[f64], fs: f64, cutoff_hz: f64, order: usize) -> Result<Vec<f64>> {
    let design = ButterworthFilter::lowpass(order, cutoff_hz, fs)?;
    Ok(design.filtfilt(amplitude))
}

/// Zero-phase band-pass filter between `low_hz` and `high_hz`.
pub fn bandpass_filter(
    amplitude: &[f64],
    fs: f64,
    low_hz: f64,
    high_hz: f64,
    order: usize,
) -> Result<Vec<f64>> {
    let design = ButterworthFilter::bandpass(order, low_hz, high_hz, fs)?;
    Ok(design.filtfilt(amplitude))
}

fn validate(order: usize, cutoff_hz: f64, fs: f64) -> Result<()> {
    if !(fs.is_finite() && fs > 0.0) {
        return Err(MonitorError::FilterConfig(format!(
            "sampling rate must be positive, got {}",
            fs
        )));
    }
    if order == 0 {
        return Err(MonitorError::FilterConfig("order must be at least 1".into()));
    }
    if !(cutoff_hz.is_finite() && cutoff_hz > 0.0) {
        return Err(MonitorError::FilterConfig(format!(
            "cutoff must be positive, got {} Hz",
            cutoff_hz
        )));
    }
    if cutoff_hz >= fs / 2.0 {
        return Err(MonitorError::FilterConfig(format!(
            "cutoff {} Hz is at or above Nyquist ({} Hz)",
            cutoff_hz,
            fs / 2.0
        )));
    }
    Ok(())
}

fn design(order: usize, cutoff_hz: f64, fs: f64, kind: FilterKind) -> Vec<Section> {
    let k = 2.0 * fs;
    let wc = k * (PI * cutoff_hz / fs).tan();
    let mut sections = Vec::with_capacity(order / 2 + 1);
    for m in 0..order / 2 {
        let theta = PI * (2 * m + 1) as f64 / (2 * order) as f64;
        let p_re = -wc * theta.sin();
        sections.push(pole_pair(p_re, wc * wc, k, kind));
    }
    if order % 2 == 1 {
        sections.push(real_pole(-wc, k, kind));
    }
    sections
}

/// Bilinear transform of a complex-conjugate pole pair.
fn pole_pair(p_re: f64, p_mag_sq: f64, k: f64, kind: FilterKind) -> Section {
    let k2 = k * k;
    let d = k2 - 2.0 * k * p_re + p_mag_sq;
    let a = [
        2.0 * (p_mag_sq - k2) / d,
        (k2 + 2.0 * k * p_re + p_mag_sq) / d,
    ];
    let b = match kind {
        FilterKind::Lowpass => [p_mag_sq / d, 2.0 * p_mag_sq / d, p_mag_sq / d],
        FilterKind::Highpass => [k2 / d, -2.0 * k2 / d, k2 / d],
    };
    Section { b, a }
}

/// Bilinear transform of the real pole of an odd-order design.
fn real_pole(p: f64, k: f64, kind: FilterKind) -> Section {
    let alpha = k - p;
    let a1 = -(k + p) / alpha;
    let b = match kind {
        FilterKind::Lowpass => [-p / alpha, -p / alpha, 0.0],
        FilterKind::Highpass => [k / alpha, -k / alpha, 0.0],
    };
    Section { b, a: [a1, 0.0] }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    // Amplitude from RMS over the central half, away from edge transients.
    fn amplitude(data: &[f64]) -> f64 {
        let mid = &data[data.len() / 4..data.len() / 4 + data.len() / 2];
        (mid.iter().map(|x| x * x).sum::<f64>() / mid.len() as f64).sqrt() * 2f64.sqrt()
    }

    #[test]
    fn preserves_length_and_dc() {
        let data = vec![3.25; 500];
        for order in 1..=6 {
            let out = filter(&data, 250.0, 15.0, order).unwrap();
            assert_eq!(out.len(), data.len());
            assert!(out.iter().all(|y| (y - 3.25).abs() < 1e-9), "order {}", order);
        }
    }

    #[test]
    fn half_power_at_cutoff_for_every_order() {
        for order in 1..=6 {
            let f = ButterworthFilter::lowpass(order, 15.0, 250.0).unwrap();
            assert!((f.gain_at(15.0, 250.0) - 0.5f64.sqrt()).abs() < 1e-9);
            assert!((f.gain_at(0.0, 250.0) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn attenuation_grows_with_order() {
        let fs = 250.0;
        let at_cutoff = sine(15.0, fs, 2000);
        let above = sine(30.0, fs, 2000);
        let mut prev_cut = f64::MAX;
        let mut prev_above = f64::MAX;
        for order in 1..=6 {
            let cut = amplitude(&filter(&at_cutoff, fs, 15.0, order).unwrap());
            let high = amplitude(&filter(&above, fs, 15.0, order).unwrap());
            // forward-backward squares the single-pass gain: 0.5 at cutoff
            assert!((cut - 0.5).abs() < 0.02, "order {} cutoff amp {}", order, cut);
            assert!(cut <= prev_cut + 0.02);
            assert!(high < prev_above, "order {} amp {} >= {}", order, high, prev_above);
            prev_cut = cut;
            prev_above = high;
        }
    }

    #[test]
    fn zero_phase_keeps_peak_position() {
        let fs = 250.0;
        let mut data = vec![0.0; 600];
        for (i, v) in data.iter_mut().enumerate() {
            let t = (i as f64 - 300.0) / fs;
            *v = (-0.5 * (t / 0.02).powi(2)).exp();
        }
        let out = filter(&data, fs, 15.0, 4).unwrap();
        let peak = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 300);
    }

    #[test]
    fn rejects_invalid_configuration() {
        let data = vec![0.0; 10];
        assert!(matches!(
            filter(&data, 0.0, 15.0, 4),
            Err(MonitorError::FilterConfig(_))
        ));
        assert!(matches!(
            filter(&data, 250.0, 125.0, 4),
            Err(MonitorError::FilterConfig(_))
        ));
        assert!(matches!(
            filter(&data, 250.0, 15.0, 0),
            Err(MonitorError::FilterConfig(_))
        ));
        assert!(matches!(
            bandpass_filter(&data, 250.0, 20.0, 5.0, 2),
            Err(MonitorError::FilterConfig(_))
        ));
    }

    #[test]
    fn bandpass_rejects_baseline_wander() {
        let fs = 250.0;
        let drift = sine(0.1, fs, 5000);
        let out = bandpass_filter(&drift, fs, 0.5, 15.0, 2).unwrap();
        assert!(amplitude(&out) < 0.05);
    }

    #[test]
    fn handles_tiny_inputs() {
        assert!(filter(&[], 250.0, 15.0, 4).unwrap().is_empty());
        let one = filter(&[2.0], 250.0, 15.0, 4).unwrap();
        assert!((one[0] - 2.0).abs() < 1e-12);
    }
}
