use serde::{Deserialize, Serialize};

/// Time-domain variability over accepted RR intervals (seconds).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HRVTime {
    pub n: usize,
    pub avnn: f64,
    pub sdnn: f64,
    pub rmssd: f64,
    pub pnn50: f64,
}

pub fn hrv_time(rr: &[f64]) -> HRVTime {
    let n = rr.len();
    if n == 0 {
        return HRVTime::default();
    }
    let avnn = rr.iter().sum::<f64>() / n as f64;
    if n == 1 {
        return HRVTime {
            n,
            avnn,
            ..HRVTime::default()
        };
    }
    let denom = n as f64 - 1.0;
    let sdnn = (rr.iter().map(|x| (x - avnn).powi(2)).sum::<f64>() / denom).sqrt();
    let successive: Vec<f64> = rr.windows(2).map(|w| w[1] - w[0]).collect();
    let rmssd = (successive.iter().map(|d| d * d).sum::<f64>() / denom).sqrt();
    let pnn50 = successive.iter().filter(|d| d.abs() > 0.050).count() as f64 / denom;
    HRVTime {
        n,
        avnn,
        sdnn,
        rmssd,
        pnn50,
    }
}
