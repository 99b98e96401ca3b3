use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Failed to parse KDL")]
    #[diagnostic(code(hyprland_ipc::config::parse_error))]
    ParseError {
        #[source_code]
        src: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source]
        source: kdl::KdlError,
    },

    /// Well-formed KDL with a value this crate cannot use
    #[error("Invalid configuration: {message}")]
    #[diagnostic(
        code(hyprland_ipc::config::invalid),
        help("see the `log-level`, `instance`, `command` and `watch` nodes")
    )]
    Invalid {
        message: String,
        #[source_code]
        src: String,
        #[label("here")]
        span: miette::SourceSpan,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// An `Invalid` error pointing at `len` bytes from `offset` in `src`
    pub(crate) fn invalid_at(src: &str, offset: usize, len: usize, message: String) -> Self {
        Self::Invalid {
            message,
            src: src.to_string(),
            span: miette::SourceSpan::from((offset, len)),
        }
    }
}
