/// Core error type.
///
/// Adapter crates map their transport errors into `External` so callers can
/// tell listener failures apart from send/edit failures. Timeouts and
/// cancellations are not errors; see `listen::WaitOutcome`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid listener scope: {0}")]
    InvalidScope(String),

    #[error("unexpected event kind: {0}")]
    UnexpectedEventKind(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
