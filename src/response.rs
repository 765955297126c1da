//! Response definitions
//!
//! The outcome of an operation as reported to a process entry point: a
//! three-way status and a human-readable message.

use std::fmt;

use crate::error::{ErrorClass, Result};

/// Response status codes (HTTP-style)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Status {
    Ok = 200,
    ClientError = 406,
    ServerError = 500,
}

impl Status {
    pub fn code(&self) -> u16 {
        *self as u16
    }

    pub fn is_ok(&self) -> bool {
        *self == Status::Ok
    }
}

/// A response for the caller of an entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// What happened, or why it failed
    pub message: String,
}

impl Response {
    /// Create an OK response
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            message: message.into(),
        }
    }

    /// Create a CLIENT_ERROR response
    pub fn client_error(message: impl Into<String>) -> Self {
        Self {
            status: Status::ClientError,
            message: message.into(),
        }
    }

    /// Create a SERVER_ERROR response
    pub fn server_error(message: impl Into<String>) -> Self {
        Self {
            status: Status::ServerError,
            message: message.into(),
        }
    }

    /// Classify a result; `on_success` renders the OK message
    pub fn from_result<T>(result: Result<T>, on_success: impl FnOnce(T) -> String) -> Self {
        match result {
            Ok(value) => Self::ok(on_success(value)),
            Err(e) => match e.class() {
                ErrorClass::Client => Self::client_error(e.to_string()),
                ErrorClass::Server => Self::server_error(e.to_string()),
            },
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status.code(), self.message)
    }
}
