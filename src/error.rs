use std::env;
use std::fmt::{self, Debug, Display};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

impl Error {
    /// Errors in the `100+` range are caused by the caller or the operator
    /// and carry a message fit to show next to the map.
    pub fn is_user_facing(&self) -> bool {
        self.code >= 100
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
        unexpected_error_with(err)
    }
}

pub const MALFORMED_COORDINATE: i32 = 110;
pub const INSUFFICIENT_GEOMETRY: i32 = 111;
pub const SURFACE_ALREADY_ACTIVE: i32 = 6;
pub const CONTAINER_NOT_READY: i32 = 7;
pub const NOT_FOUND: i32 = 112;

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

pub fn invalid_field_error(field: &str, reason: &str) -> Error {
    Error {
        code: 101,
        message: format!("{}: {}", field, reason),
    }
}

pub fn malformed_coordinate_error() -> Error {
    Error {
        code: MALFORMED_COORDINATE,
        message: "invalid coordinate format, expected lat,lng (e.g. -6.2088,106.8456)".into(),
    }
}

pub fn malformed_point_error(position: usize) -> Error {
    Error {
        code: MALFORMED_COORDINATE,
        message: format!("point {} is not a valid lat,lng coordinate", position),
    }
}

pub fn insufficient_geometry_error(found: usize) -> Error {
    Error {
        code: INSUFFICIENT_GEOMETRY,
        message: format!("at least 2 coordinates are required, found {}", found),
    }
}

pub fn surface_already_active_error() -> Error {
    Error {
        code: SURFACE_ALREADY_ACTIVE,
        message: "a map surface is already active on this container".into(),
    }
}

pub fn container_not_ready_error() -> Error {
    Error {
        code: CONTAINER_NOT_READY,
        message: "map container has no size".into(),
    }
}

pub fn not_found_error() -> Error {
    Error {
        code: NOT_FOUND,
        message: "route not found".into(),
    }
}

pub fn env_var_error(_: env::VarError) -> Error {
    Error {
        code: 1,
        message: "environment variable error".into(),
    }
}

pub fn reqwest_error(_: reqwest::Error) -> Error {
    Error {
        code: 3,
        message: "reqwest error".into(),
    }
}

pub fn upstream_error() -> Error {
    Error {
        code: 4,
        message: "upstream error".into(),
    }
}

pub fn unexpected_error() -> Error {
    Error {
        code: 5,
        message: "unexpected error".into(),
    }
}

pub fn unexpected_error_with<T: Debug>(err: T) -> Error {
    Error {
        code: 5,
        message: format!("unexpected error: {:?}", err),
    }
}

#[test]
fn user_facing_ranges_test() {
    assert!(malformed_coordinate_error().is_user_facing());
    assert!(insufficient_geometry_error(1).is_user_facing());
    assert!(!upstream_error().is_user_facing());
    assert!(!surface_already_active_error().is_user_facing());
    assert!(!unexpected_error().is_user_facing());
}
