use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub(crate) path: PathBuf,
    pub(crate) planes: usize,
    pub(crate) loopback: bool,
    pub(crate) clock_source: String,
    pub(crate) sample_rate: f64,
}
