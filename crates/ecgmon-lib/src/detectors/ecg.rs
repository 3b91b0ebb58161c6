use crate::config::DetectorSettings;
use crate::signal::PeakSet;

/// Detect R-peaks with the default threshold (mean + 2 SD) and 200 ms refractory period.
pub fn detect_peaks(filtered: &[f64], fs: f64) -> PeakSet {
    detect_peaks_with_config(filtered, fs, &DetectorSettings::default())
}

/// Detect R-peaks in an already filtered trace.
///
/// A sample is accepted when it is a local maximum above
/// `mean + threshold_sd * stddev` and lies at least `refractory_s * fs`
/// samples after the previously accepted peak. The scan is greedy: the
/// earliest qualifying maximum wins and the refractory period restarts from
/// it, so later (even taller) candidates inside that window are dropped.
/// A flat top counts once, at its first sample, and only if the trace falls
/// after it.
pub fn detect_peaks_with_config(filtered: &[f64], fs: f64, cfg: &DetectorSettings) -> PeakSet {
    if filtered.len() < 3 {
        return PeakSet::default();
    }
    let (mean, sd) = mean_and_sd(filtered);
    let threshold = mean + cfg.threshold_sd * sd;
    let min_gap = cfg.refractory_s * fs;

    let n = filtered.len();
    let mut peaks = Vec::new();
    let mut last: Option<usize> = None;
    let mut i = 1;
    while i + 1 < n {
        let y = filtered[i];
        if y <= filtered[i - 1] {
            i += 1;
            continue;
        }
        let mut end = i + 1;
        while end < n && filtered[end] == y {
            end += 1;
        }
        if end == n {
            break;
        }
        let refractory_ok = last.map_or(true, |prev| ((i - prev) as f64) >= min_gap);
        if filtered[end] < y && y > threshold && refractory_ok {
            peaks.push(i);
            last = Some(i);
        }
        i = end;
    }
    PeakSet::from_sorted(peaks)
}

/// Population mean and standard deviation.
pub(crate) fn mean_and_sd(data: &[f64]) -> (f64, f64) {
    if data.is_empty() {
        return (0.0, 0.0);
    }
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    let var = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Gaussian QRS-like bumps at the given sample positions.
    pub(crate) fn bumps(len: usize, centers: &[usize], width: f64) -> Vec<f64> {
        (0..len)
            .map(|i| {
                centers
                    .iter()
                    .map(|&c| {
                        let d = (i as f64 - c as f64) / width;
                        (-0.5 * d * d).exp()
                    })
                    .sum()
            })
            .collect()
    }

    #[test]
    fn recovers_regular_beats() {
        let fs = 250.0;
        for k in [100usize, 150, 200, 300] {
            let centers: Vec<usize> = (1..12).map(|i| i * k).collect();
            let data = bumps(12 * k + 50, &centers, 3.0);
            let peaks = detect_peaks(&data, fs);
            assert_eq!(peaks.len(), centers.len(), "k = {}", k);
            for (found, expected) in peaks.indices().iter().zip(&centers) {
                assert!(found.abs_diff(*expected) <= 1, "k = {}: {} vs {}", k, found, expected);
            }
        }
    }

    #[test]
    fn refractory_keeps_earliest_peak() {
        let fs = 250.0;
        // 30 samples = 120 ms apart: the second, taller bump must be dropped.
        let mut data = bumps(2000, &[500, 1000, 1500], 3.0);
        let extra = bumps(2000, &[1030], 3.0);
        for (d, e) in data.iter_mut().zip(extra) {
            *d += 1.5 * e;
        }
        let peaks = detect_peaks(&data, fs);
        assert_eq!(peaks.indices(), &[500, 1000, 1500]);
    }

    #[test]
    fn refractory_restarts_from_accepted_peak() {
        let fs = 250.0;
        // 40 and 80 samples after 500: the first is suppressed, the second is
        // 80 samples (>= 50) after the accepted peak and survives.
        let data = bumps(2000, &[500, 540, 580, 1200, 1600], 3.0);
        let peaks = detect_peaks(&data, fs);
        assert_eq!(peaks.indices(), &[500, 580, 1200, 1600]);
    }

    #[test]
    fn rising_plateau_is_not_a_maximum() {
        let mut data = vec![0.0; 1000];
        data[200] = 5.0;
        data[201] = 5.0;
        data[202] = 6.0;
        assert_eq!(detect_peaks(&data, 250.0).indices(), &[202]);
    }

    #[test]
    fn flat_top_reports_its_first_sample() {
        let mut data = vec![0.0; 1000];
        data[300] = 4.0;
        data[301] = 4.0;
        data[302] = 4.0;
        data[700] = 4.0;
        assert_eq!(detect_peaks(&data, 250.0).indices(), &[300, 700]);
    }

    #[test]
    fn flat_or_short_signals_yield_no_peaks() {
        assert!(detect_peaks(&[1.0; 400], 250.0).is_empty());
        assert!(detect_peaks(&[0.0, 5.0], 250.0).is_empty());
        assert!(detect_peaks(&[], 250.0).is_empty());
    }

    #[test]
    fn single_beat_is_valid() {
        let data = bumps(1000, &[400], 3.0);
        assert_eq!(detect_peaks(&data, 250.0).indices(), &[400]);
    }
}
