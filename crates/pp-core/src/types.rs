//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The provided value exceeds its maximum length in characters.
    #[error("{field} must be at most {max} characters, got {len}")]
    TooLong {
        field: &'static str,
        max: usize,
        len: usize,
    },

    /// A numeric value was outside its allowed range.
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },

    /// Point values of zero carry no meaning.
    #[error("point value cannot be zero")]
    ZeroPoints,

    /// A string did not name a member of a fixed enumeration.
    #[error("invalid {field}: {value}")]
    UnknownVariant { field: &'static str, value: String },

    /// The behavior is switched off in the catalog.
    #[error("behavior {0} is not active")]
    InactiveBehavior(String),

    /// The behavior does not apply to the pet's species.
    #[error("behavior {behavior} does not apply to {species} pets")]
    WrongSpecies { behavior: String, species: String },

    /// `logged_at` lies after the current instant.
    #[error("logged_at cannot be in the future")]
    LoggedInFuture,

    /// `logged_at` lies more than the allowed window before the current instant.
    #[error("logged_at cannot be more than {hours} hours in the past")]
    LoggedTooLongAgo { hours: i64 },

    /// A log is already shared with the group.
    #[error("log is already shared with group {0}")]
    AlreadyShared(String),

    /// The pet does not belong to the group it is being shared with.
    #[error("pet {pet} is not a member of group {group}")]
    PetNotInGroup { pet: String, group: String },

    /// A catalog entry with this ID already exists.
    #[error("behavior {0} already exists")]
    DuplicateBehavior(String),
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ValidationError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated pet identifier.
    PetId, "pet ID"
);

define_string_id!(
    /// A validated behavior identifier.
    ///
    /// Behavior IDs key the catalog; they are chosen by whoever administers it
    /// (e.g. "potty-outside", "jumped-on-couch").
    BehaviorId, "behavior ID"
);

define_string_id!(
    /// A validated user identifier.
    UserId, "user ID"
);

define_string_id!(
    /// A validated group identifier.
    GroupId, "group ID"
);

define_string_id!(
    /// A validated behavior log identifier.
    ///
    /// Freshly recorded logs get a random UUID; stored logs keep whatever ID
    /// the store handed back.
    LogId, "log ID"
);

impl LogId {
    /// Generates a fresh random log ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Checks that `value` is at most `max` characters long.
pub(crate) fn check_max_chars(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max {
        return Err(ValidationError::TooLong { field, max, len });
    }
    Ok(())
}

/// Checks that `value` lies in the inclusive range `[min, max]`.
pub(crate) fn check_range(
    field: &'static str,
    value: i64,
    min: i64,
    max: i64,
) -> Result<(), ValidationError> {
    if !(min..=max).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field,
            min,
            max,
            value,
        });
    }
    Ok(())
}
