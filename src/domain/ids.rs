//! Strongly-typed identifier value objects.
//!
//! The workforce platform keys its entities by integer ids; the newtypes
//! keep a channel id from ever being passed where a meeting id belongs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

macro_rules! int_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an id from its integer representation.
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the inner integer.
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

int_id! {
    /// Unique identifier for a platform user (employee).
    UserId
}

int_id! {
    /// Unique identifier for a tenant company.
    CompanyId
}

int_id! {
    /// Unique identifier for a chat channel.
    ChannelId
}

int_id! {
    /// Unique identifier for a live meeting.
    MeetingId
}

int_id! {
    /// Unique identifier for a persisted chat message.
    MessageId
}
