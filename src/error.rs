//! Error categories for webhook delivery

use reqwest::header::InvalidHeaderValue;
use std::error::Error as StdError;
use std::io;
use thiserror::Error;

/// Failure of a single webhook POST
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The server answered with an error status
    #[error("Invalid response from notify")]
    InvalidResponse(#[source] reqwest::Error),

    /// No connection could be established, or it dropped mid-request
    #[error("Could not connect to notify server")]
    Connect(#[source] reqwest::Error),

    /// The request outlived the client timeout
    #[error("Notify server timed out")]
    Timeout(#[source] reqwest::Error),

    /// Any other transport failure
    #[error("Failed to send notify payload")]
    Request(#[source] reqwest::Error),

    /// The token cannot be sent as a header value
    #[error("Invalid notify token")]
    InvalidToken(#[source] InvalidHeaderValue),

    /// The shared HTTP client could not be built
    #[error("Failed to build notify client")]
    Client(#[source] reqwest::Error),
}

impl NotifyError {
    /// Message and every underlying cause, for logging
    pub fn chain(&self) -> String {
        error_chain(self)
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        // A connect timeout is a connection failure, not a response timeout
        if e.is_status() {
            NotifyError::InvalidResponse(e)
        } else if e.is_connect() || connection_lost(&e) {
            NotifyError::Connect(e)
        } else if e.is_timeout() {
            NotifyError::Timeout(e)
        } else {
            NotifyError::Request(e)
        }
    }
}

/// Render an error followed by each of its causes, separated by ": "
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// Whether any cause is an I/O error from the peer dropping the connection
fn connection_lost(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::NotConnected
            ) {
                return true;
            }
        }
        current = e.source();
    }
    false
}
