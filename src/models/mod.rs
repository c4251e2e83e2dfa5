// Data models for frames, landmarks and detection results

pub mod frame;
pub mod pose;
