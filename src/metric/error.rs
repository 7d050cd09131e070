use super::MetricKey;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid metric meta: {0}")]
    InvalidMeta(String),
    #[error("metric `{metric}` advertises an invalid period of {period}s")]
    InvalidPeriod { metric: String, period: u32 },
    #[error("series `{series}` does not belong to metric `{metric}`")]
    SeriesMismatch { metric: MetricKey, series: String },
}

pub type Result<T> = std::result::Result<T, Error>;
