//! Actor identity recorded on stock changes.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`Actor`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum ActorError {
    /// The input is empty or only whitespace.
    #[error("actor cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("actor must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// Who caused a stock change: a username, a customer name, or a system job.
///
/// Leading and trailing whitespace is trimmed on parse.
///
/// ## Examples
///
/// ```
/// use stockroom_core::Actor;
///
/// assert_eq!(Actor::parse("  alice ").unwrap().as_str(), "alice");
/// assert!(Actor::parse("   ").is_err());
/// assert_eq!(Actor::system().as_str(), "System");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Actor(String);

impl Actor {
    /// Maximum length of an actor identity.
    pub const MAX_LENGTH: usize = 128;

    /// Parse an `Actor` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty or longer than
    /// [`Actor::MAX_LENGTH`] characters.
    pub fn parse(s: &str) -> Result<Self, ActorError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ActorError::Empty);
        }

        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(ActorError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// The actor used for unattended operations.
    #[must_use]
    pub fn system() -> Self {
        Self("System".to_owned())
    }

    /// Returns the actor as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Actor` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Actor {
    type Err = ActorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Actor {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Actor {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Actor {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Rows were written through `Actor::parse`
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Actor {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(Actor::parse(" warehouse-bot\n").unwrap().as_str(), "warehouse-bot");
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(Actor::parse(""), Err(ActorError::Empty)));
        assert!(matches!(Actor::parse(" \t "), Err(ActorError::Empty)));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "a".repeat(Actor::MAX_LENGTH + 1);
        assert!(matches!(
            Actor::parse(&long),
            Err(ActorError::TooLong { max: 128 })
        ));
        assert!(Actor::parse(&"a".repeat(Actor::MAX_LENGTH)).is_ok());
    }

    #[test]
    fn test_serde_transparent() {
        let actor = Actor::parse("alice").unwrap();
        assert_eq!(serde_json::to_string(&actor).unwrap(), "\"alice\"");
    }
}
