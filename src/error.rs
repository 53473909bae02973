use core::time::Duration;

/// Failures the scraper raises itself. Browser and I/O failures travel as
/// plain [`anyhow::Error`]s; these can be told apart with
/// `err.downcast_ref::<Error>()`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },
    #[error("unexpected page structure: {0}")]
    Structure(String),
}

impl Error {
    pub fn structure(msg: impl Into<String>) -> Self {
        Self::Structure(msg.into())
    }

    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
