//! # Session Buffers
//!
//! Entities serialize themselves into two growing buffers, one of integers and one of floats.
//! Each entity type describes the fixed-width header it writes for a given session version in
//! a declarative [`SessionLayout`] table, so the set of versions that can still be read is
//! visible in one place instead of being spread over branching restore code.
//!
//! Names and other text do not fit the numeric buffers; the structure-level
//! [`SessionData`] carries them in a third, string buffer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The version written by every `session_save`.
pub const CURRENT_SESSION_VERSION: u32 = 10;

/// The oldest version `session_restore` accepts.
pub const MIN_SESSION_VERSION: u32 = 1;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error(
        "Unsupported session version {version} (supported: {min}..={max})",
        min = MIN_SESSION_VERSION,
        max = CURRENT_SESSION_VERSION
    )]
    UnsupportedVersion { version: u32 },

    #[error("Session data ended early while reading {what}")]
    Truncated { what: &'static str },

    #[error("Invalid session value for {field}: {value}")]
    BadValue { field: &'static str, value: i64 },
}

/// The fixed header one entity type writes for a range of session versions.
///
/// `ints` names the meaning of each integer slot in order; `num_floats` is the width of the
/// float header. Variable-length trailers (such as a residue's atom indices) follow the header
/// and are not part of the layout.
#[derive(Debug)]
pub struct SessionLayout<F: 'static> {
    pub min_version: u32,
    pub max_version: u32,
    pub ints: &'static [F],
    pub num_floats: usize,
}

impl<F> SessionLayout<F> {
    pub fn covers(&self, version: u32) -> bool {
        (self.min_version..=self.max_version).contains(&version)
    }
}

/// Finds the layout that applies to `version`.
pub fn layout_for<F>(
    layouts: &'static [SessionLayout<F>],
    version: u32,
) -> Result<&'static SessionLayout<F>, SessionError> {
    if !(MIN_SESSION_VERSION..=CURRENT_SESSION_VERSION).contains(&version) {
        return Err(SessionError::UnsupportedVersion { version });
    }
    layouts
        .iter()
        .find(|layout| layout.covers(version))
        .ok_or(SessionError::UnsupportedVersion { version })
}

/// Consumes `n` integers from the front of `buf`.
pub fn take_ints<'a>(
    buf: &mut &'a [i32],
    n: usize,
    what: &'static str,
) -> Result<&'a [i32], SessionError> {
    if buf.len() < n {
        return Err(SessionError::Truncated { what });
    }
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

/// Consumes `n` floats from the front of `buf`.
pub fn take_floats<'a>(
    buf: &mut &'a [f32],
    n: usize,
    what: &'static str,
) -> Result<&'a [f32], SessionError> {
    if buf.len() < n {
        return Err(SessionError::Truncated { what });
    }
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

pub fn take_string<'a>(
    buf: &mut &'a [String],
    what: &'static str,
) -> Result<&'a str, SessionError> {
    let (head, tail) = buf
        .split_first()
        .ok_or(SessionError::Truncated { what })?;
    *buf = tail;
    Ok(head.as_str())
}

/// Decodes a character stored as an integer slot.
pub fn int_to_char(value: i32, field: &'static str) -> Result<char, SessionError> {
    u32::try_from(value)
        .ok()
        .and_then(char::from_u32)
        .ok_or(SessionError::BadValue {
            field,
            value: value as i64,
        })
}

/// Decodes a non-negative count or index stored as an integer slot.
pub fn int_to_usize(value: i32, field: &'static str) -> Result<usize, SessionError> {
    usize::try_from(value).map_err(|_| SessionError::BadValue {
        field,
        value: value as i64,
    })
}

/// A complete structure snapshot in the three session buffers.
///
/// The enclosing session file format belongs to the host; this type only guarantees that the
/// buffers round-trip through any `serde` format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub version: u32,
    pub ints: Vec<i32>,
    pub floats: Vec<f32>,
    pub strings: Vec<String>,
}
