//! Length-checked string newtypes.

use thiserror::Error;

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
#[error("{field} must be between {min} and {max} characters long")]
pub struct InvalidTextError {
    pub field: &'static str,
    pub min: usize,
    pub max: usize,
}

/// Declares a `String` newtype whose character count is checked on construction
/// and on deserialization. Single-line fields are trimmed before the check.
macro_rules! bounded_text {
    ($(#[$meta:meta])* $name:ident: $field:literal, $min:literal..=$max:literal, trim = $trim:literal) => {
        $(#[$meta])*
        #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, ::serde::Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const MIN_CHARS: usize = $min;
            pub const MAX_CHARS: usize = $max;

            pub fn new(value: impl Into<String>) -> Result<Self, $crate::model::text::InvalidTextError> {
                let value = value.into();
                let value = if $trim { value.trim().to_owned() } else { value };
                let chars = value.chars().count();
                let meaningful = if $trim { chars } else { value.trim().chars().count() };

                if meaningful < Self::MIN_CHARS || chars > Self::MAX_CHARS {
                    return Err($crate::model::text::InvalidTextError {
                        field: $field,
                        min: Self::MIN_CHARS,
                        max: Self::MAX_CHARS,
                    });
                }

                Ok(Self(value))
            }

            #[must_use]
            pub fn get(&self) -> &str {
                &self.0
            }

            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                let inner = <String as ::serde::Deserialize<'de>>::deserialize(deserializer)?;
                Self::new(inner).map_err(<D::Error as ::serde::de::Error>::custom)
            }
        }
    };
}

pub(crate) use bounded_text;
