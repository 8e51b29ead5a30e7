/// Failures while turning a [`Config`](crate::config::Config) into compiled tables.
///
/// These only occur at construction time. Parsing a response never fails.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("keyword table `{0}` is empty")]
    EmptyTable(String),

    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("threshold `{0}` must be greater than zero")]
    InvalidThreshold(&'static str),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
}
