//! Machine-readable result codes reported in response payloads.

use serde_json::Value;
use strum::Display;

/// Outcome code stored under the `success` key of a response document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ResultCode {
    /// The request succeeded.
    Ok,
    /// The unit of work failed.
    Fail,
    /// The request named an unknown method or carried bad parameters.
    InvalidParam,
    /// The caller's privilege does not match the handler's.
    AccessDenied,
    /// The unit of work missed its deadline.
    Timeout,
}

impl ResultCode {
    /// Integer value placed in response documents.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Ok => 1,
            Self::Fail => 2,
            Self::InvalidParam => 8,
            Self::AccessDenied => 15,
            Self::Timeout => 16,
        }
    }

    /// Maps a document value back to a code.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Ok),
            2 => Some(Self::Fail),
            8 => Some(Self::InvalidParam),
            15 => Some(Self::AccessDenied),
            16 => Some(Self::Timeout),
            _ => None,
        }
    }

    /// Returns `true` for [`ResultCode::Ok`].
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl From<ResultCode> for Value {
    fn from(code: ResultCode) -> Self {
        Self::from(code.code())
    }
}
