//! Strongly typed identifiers for lists, tasks, and users.
//!
//! Identifiers read from documents can be any non-empty string, so each id
//! wraps a `String` rather than a `Uuid`. Ids minted in-process come from an
//! [`IdGenerator`](crate::environment::IdGenerator) and are UUID v4 text in
//! production.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when parsing an empty identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Identifier cannot be empty")]
pub struct EmptyIdError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a trusted string without validation.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = EmptyIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(EmptyIdError);
                }
                Ok(Self(trimmed.to_string()))
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Identifier of a task list.
    ///
    /// The literal `"all"` is reserved for the synthetic union view and never
    /// names a persisted list; see [`ListId::ALL`].
    ListId
}

string_id! {
    /// Identifier of a task node (root task or nested subtask).
    TaskId
}

string_id! {
    /// Identifier of the authenticated owner of lists and tasks.
    UserId
}

impl ListId {
    /// The reserved id of the synthetic "all tasks" view.
    pub const ALL: &'static str = "all";

    /// Returns the synthetic "all tasks" list id.
    #[must_use]
    pub fn all() -> Self {
        Self(Self::ALL.to_string())
    }

    /// Whether this id names the synthetic "all tasks" view.
    #[must_use]
    pub fn is_all(&self) -> bool {
        self.0 == Self::ALL
    }
}
