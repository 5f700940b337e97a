use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps a secret (session tokens, phone numbers) so it never shows up in
/// `Debug`/`Display` output, including `tracing` fields.
///
/// Serialization writes the real value: the session store has to persist it.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(T);

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> From<T> for Masked<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_hide_value() {
        let token = Masked::new("eyJhbGciOi".to_string());
        assert_eq!(format!("{:?}", token), "********");
        assert_eq!(token.to_string(), "********");
        assert_eq!(token.expose(), "eyJhbGciOi");
    }

    #[test]
    fn test_serde_keeps_real_value() {
        let token = Masked::new("secret".to_string());
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"secret\"");
        let back: Masked<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }
}
