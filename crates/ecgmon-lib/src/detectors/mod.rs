pub mod beats;
pub mod ecg;
