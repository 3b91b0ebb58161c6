use crate::error::{MonitorError, Result};
use crate::signal::Waveform;
use std::io::Read;
use std::path::Path;

/// Parse `time,amplitude` rows; a leading non-numeric header row is skipped.
pub fn parse_csv_waveform<R: Read>(reader: R) -> std::result::Result<(Vec<f64>, Vec<f64>), String> {
    let mut rdr = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(::csv::Trim::All)
        .from_reader(reader);

    let mut time = Vec::new();
    let mut amplitude = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| e.to_string())?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        if record.len() < 2 {
            return Err(format!(
                "row {} has {} column(s), expected time and amplitude",
                idx + 1,
                record.len()
            ));
        }
        let t = record[0].parse::<f64>();
        let v = record[1].parse::<f64>();
        match (t, v) {
            (Ok(t), Ok(v)) => {
                time.push(t);
                amplitude.push(v);
            }
            _ if idx == 0 => continue,
            _ => {
                return Err(format!(
                    "row {} is not numeric: {},{}",
                    idx + 1,
                    &record[0],
                    &record[1]
                ))
            }
        }
    }
    if amplitude.is_empty() {
        return Err("no numeric rows found".into());
    }
    Ok((time, amplitude))
}

pub fn read_csv_waveform(path: &Path) -> Result<Waveform> {
    let file = std::fs::File::open(path).map_err(|e| MonitorError::load(path, e))?;
    let (time, amplitude) =
        parse_csv_waveform(file).map_err(|reason| MonitorError::load(path, reason))?;
    Waveform::new(time, amplitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_with_and_without_header() {
        let (t, v) = parse_csv_waveform("time, mV\n0.0, 0.1\n0.5, 0.2\n".as_bytes()).unwrap();
        assert_eq!(t, vec![0.0, 0.5]);
        assert_eq!(v, vec![0.1, 0.2]);

        let (t, _) = parse_csv_waveform("0.0,1\n1.0,2\n".as_bytes()).unwrap();
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn rejects_single_column_and_garbage_rows() {
        assert!(parse_csv_waveform("0.1\n0.2\n".as_bytes()).is_err());
        assert!(parse_csv_waveform("0.0,1\nfoo,bar\n".as_bytes()).is_err());
        assert!(parse_csv_waveform("time,ecg\n".as_bytes()).is_err());
    }

    #[test]
    fn non_monotonic_time_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "0.0,1\n0.0,2\n").unwrap();
        assert!(matches!(
            read_csv_waveform(&path),
            Err(MonitorError::Input(_))
        ));
    }
}
