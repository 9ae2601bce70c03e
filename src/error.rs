use thiserror::Error;

/// A failure whose message is safe and meaningful to show to an operator.
///
/// Everything else that escapes the top-level driver is treated as an
/// internal error. The distinction drives the process exit code: user
/// errors exit 1, anything unclassified exits 2.
#[derive(Debug, Error)]
pub enum UserError {
    /// A remote call failed (timeout, refused connection, bad response).
    /// The message always names the URL or command that failed.
    #[error("{message}")]
    Client { message: String },

    /// A local filesystem operation failed. The message names the path.
    #[error("{message}")]
    FileSystem { message: String },
}

impl UserError {
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client {
            message: message.into(),
        }
    }

    pub fn filesystem(message: impl Into<String>) -> Self {
        Self::FileSystem {
            message: message.into(),
        }
    }

    /// Wrap a reqwest failure, preserving the timeout / connection
    /// distinction in the message text only.
    pub fn from_request(err: &reqwest::Error, url: &str) -> Self {
        let message = if err.is_timeout() && err.is_connect() {
            format!("Timed out connecting to {url}")
        } else if err.is_timeout() {
            format!("Timed out reading from {url}")
        } else if err.is_connect() {
            format!("Failed to connect to {url}")
        } else {
            format!("Request to {url} failed: {err}")
        };
        Self::Client { message }
    }
}

/// Exit code for a top-level failure: 1 for user-printable errors,
/// 2 for anything unexpected.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<UserError>().is_some() {
        1
    } else {
        2
    }
}
