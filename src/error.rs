use std::env;
use std::fmt::{self, Debug, Display};

use crate::polyline::DecodeError;

#[derive(Clone, Debug, PartialEq)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

impl Error {
    /// Infrastructure failures (environment, transport, payload) use codes below 100.
    pub fn is_internal(&self) -> bool {
        (1..=99).contains(&self.code)
    }

    pub fn is_network(&self) -> bool {
        self.code == 3
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for Error {}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        env_var_error(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        reqwest_error(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        payload_error(err)
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        decode_error(err)
    }
}

pub fn invalid_state_error() -> Error {
    Error {
        code: 100,
        message: "invalid state".into(),
    }
}

pub fn invalid_input_error() -> Error {
    Error {
        code: 101,
        message: "invalid input".into(),
    }
}

pub fn no_route_found_error() -> Error {
    Error {
        code: 102,
        message: "no route found".into(),
    }
}

pub fn position_unavailable_error() -> Error {
    Error {
        code: 103,
        message: "position unavailable".into(),
    }
}

pub fn position_timeout_error() -> Error {
    Error {
        code: 104,
        message: "position read timed out".into(),
    }
}

pub fn decode_error(err: DecodeError) -> Error {
    Error {
        code: 105,
        message: err.to_string(),
    }
}

pub fn env_var_error(_: env::VarError) -> Error {
    Error {
        code: 1,
        message: "environment variable error".into(),
    }
}

pub fn payload_error<T: Debug>(_: T) -> Error {
    Error {
        code: 2,
        message: "payload error".into(),
    }
}

pub fn reqwest_error(err: reqwest::Error) -> Error {
    if err.is_decode() {
        return payload_error(err);
    }

    network_error()
}

pub fn network_error() -> Error {
    Error {
        code: 3,
        message: "network error".into(),
    }
}

pub fn upstream_error() -> Error {
    Error {
        code: 4,
        message: "upstream error".into(),
    }
}

#[test]
fn error_classification() {
    assert!(network_error().is_network());
    assert!(network_error().is_internal());
    assert!(!no_route_found_error().is_internal());

    let err: Error = DecodeError::Truncated { offset: 3 }.into();
    assert_eq!(err.code, 105);
    assert!(err.message.contains("offset 3"));
}
