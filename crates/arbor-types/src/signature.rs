//! Author and committer identities.

use std::fmt;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Who made a change, and when.
///
/// The timestamp keeps the author's UTC offset so history can be displayed
/// in the zone it was recorded in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub when: DateTime<FixedOffset>,
}

impl Signature {
    /// A signature stamped with the current time (UTC).
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Result<Self, TypeError> {
        Self::at(name, email, Utc::now().into())
    }

    /// A signature with an explicit timestamp.
    pub fn at(
        name: impl Into<String>,
        email: impl Into<String>,
        when: DateTime<FixedOffset>,
    ) -> Result<Self, TypeError> {
        let name = name.into();
        let email = email.into();
        if name.trim().is_empty() {
            return Err(TypeError::InvalidSignature("name must not be empty".into()));
        }
        if name.contains(['<', '>', '\n']) || email.contains(['<', '>', '\n']) {
            return Err(TypeError::InvalidSignature(format!(
                "name and email must not contain '<', '>' or newlines: {name:?} <{email}>"
            )));
        }
        Ok(Self { name, email, when })
    }

    /// A signature from a unix timestamp (seconds) and an offset in minutes.
    pub fn from_unix(
        name: impl Into<String>,
        email: impl Into<String>,
        seconds: i64,
        offset_minutes: i32,
    ) -> Result<Self, TypeError> {
        let offset = FixedOffset::east_opt(offset_minutes * 60).ok_or_else(|| {
            TypeError::InvalidSignature(format!("offset out of range: {offset_minutes} minutes"))
        })?;
        let when = offset.timestamp_opt(seconds, 0).single().ok_or_else(|| {
            TypeError::InvalidSignature(format!("timestamp out of range: {seconds}"))
        })?;
        Self::at(name, email, when)
    }

    /// Seconds since the unix epoch.
    pub fn seconds(&self) -> i64 {
        self.when.timestamp()
    }

    /// Offset from UTC in minutes.
    pub fn offset_minutes(&self) -> i32 {
        self.when.offset().local_minus_utc() / 60
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <{}> {}",
            self.name,
            self.email,
            self.when.format("%Y-%m-%d %H:%M:%S %z")
        )
    }
}
