use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps card data, passport numbers and similar values so they never reach
/// log output through `Debug` or `Display`.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

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
        // Storage and responses need the real value; masking only applies to formatting.
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Masked<String> {
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Last four characters, prefixed with stars. Safe to log.
    pub fn last4(&self) -> String {
        let chars: Vec<char> = self.0.trim().chars().collect();
        let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
        format!("****{}", tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_hide_value() {
        let card = Masked::new("4111111111111111".to_string());
        assert_eq!(format!("{:?}", card), "********");
        assert_eq!(format!("{}", card), "********");
        assert_eq!(card.last4(), "****1111");
    }

    #[test]
    fn test_serialization_keeps_value() {
        let passport = Masked::new("MP1234567".to_string());
        let json = serde_json::to_string(&passport).unwrap();
        assert_eq!(json, "\"MP1234567\"");

        let back: Masked<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.expose(), "MP1234567");
    }

    #[test]
    fn test_short_values() {
        assert_eq!(Masked::new("12".to_string()).last4(), "****12");
        assert!(Masked::new("   ".to_string()).is_blank());
    }
}
