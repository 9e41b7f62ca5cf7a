pub(crate) type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config error: planes must be 1 or 2, got {0}")]
    InvalidPlanes(usize),

    #[error("config error: invalid sample rate {0}")]
    InvalidSampleRate(f64),

    #[error("config error: unknown clock source {0:?}")]
    InvalidClockSource(String),
}
