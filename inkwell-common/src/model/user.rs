use crate::model::{Id, text::bounded_text};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::{
    collections::BTreeSet,
    fmt::{Debug, Formatter},
};
use thiserror::Error;
use time::OffsetDateTime;

/// In chars, not bytes.
pub const EMAIL_MAX_LEN: usize = 254;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

bounded_text!(
    /// Display name shown next to posts and comments.
    UserName: "name", 1..=50, trim = true
);

bounded_text!(Bio: "bio", 0..=500, trim = true);

impl Bio {
    #[must_use]
    pub fn empty() -> Self {
        Self(String::new())
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub name: UserName,
    pub email: Email,
    pub bio: Bio,
    pub followers: BTreeSet<Id<UserMarker>>,
    pub following: BTreeSet<Id<UserMarker>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    #[must_use]
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// The public face of a user, embedded in posts, comments and connection lists.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Id<UserMarker>,
    pub name: UserName,
    pub email: Email,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct CreateUser {
    pub name: UserName,
    pub email: Email,
    pub password: Password,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct UpdateProfile {
    pub bio: Bio,
}

/// Lower-cased so that uniqueness is case-insensitive.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The email address is invalid: {0}")]
pub struct InvalidEmailError(String);

impl Email {
    pub fn new(email: impl Into<String>) -> Result<Self, InvalidEmailError> {
        let email = email.into().trim().to_lowercase();

        let well_formed = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty())
            && !email.chars().any(char::is_whitespace)
            && email.chars().count() <= EMAIL_MAX_LEN;

        if well_formed {
            Ok(Self(email))
        } else {
            Err(InvalidEmailError(email))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Email {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Email::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"an email address"))
    }
}

/// A plaintext password as received from a client. Never serialized.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Password(String);

impl Password {
    pub const MIN_CHARS: usize = 8;
    pub const MAX_CHARS: usize = 128;

    #[must_use]
    pub fn new(password: String) -> Option<Self> {
        (Self::MIN_CHARS..=Self::MAX_CHARS)
            .contains(&password.chars().count())
            .then_some(Self(password))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Debug for Password {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Password").field(&"[redacted]").finish()
    }
}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Password::new(inner).ok_or_else(|| {
            Error::custom(format!(
                "password must be between {} and {} characters long",
                Password::MIN_CHARS,
                Password::MAX_CHARS
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Bio, CreateUser, EMAIL_MAX_LEN, Email, Password, UserName};

    #[test]
    fn emails_are_normalized() {
        assert_eq!(Email::new("  Ada@Example.ORG ").unwrap().get(), "ada@example.org");
        for invalid in ["", "ada", "@example.org", "ada@", "a da@example.org"] {
            assert!(Email::new(invalid).is_err(), "{invalid} should be rejected");
        }

        let domain = "example.org";
        let longest = format!("{}@{domain}", "é".repeat(EMAIL_MAX_LEN - 1 - domain.len()));
        assert_eq!(longest.chars().count(), EMAIL_MAX_LEN);
        assert!(Email::new(&*longest).is_ok());
        assert!(Email::new(format!("é{longest}")).is_err());
    }

    #[test]
    fn names_and_bios_are_bounded() {
        assert!(UserName::new("").is_err());
        assert!(UserName::new("x".repeat(51)).is_err());
        assert!(Bio::new("").is_ok());
        assert!(Bio::new("x".repeat(501)).is_err());
    }

    #[test]
    fn passwords_are_redacted_and_bounded() {
        assert!(Password::new("short".into()).is_none());
        let password = Password::new("correct horse".into()).unwrap();
        assert_eq!(format!("{password:?}"), "Password(\"[redacted]\")");
    }

    #[test]
    fn signup_body_rejects_missing_fields() {
        let missing_password = r#"{"name":"Ada","email":"ada@example.org"}"#;
        assert!(serde_json::from_str::<CreateUser>(missing_password).is_err());

        let complete = r#"{"name":"Ada","email":"ada@example.org","password":"hunter2hunter2"}"#;
        let parsed: CreateUser = serde_json::from_str(complete).unwrap();
        assert_eq!(parsed.name.get(), "Ada");
    }
}
