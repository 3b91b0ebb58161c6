pub mod hrv;
pub mod rate;
