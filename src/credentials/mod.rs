// Credential pooling and session pinning
// Author: kelexine (https://github.com/kelexine)

mod pool;
mod session;

pub use pool::CredentialPool;
pub use session::Session;

use zeroize::Zeroize;

/// An opaque API key authorizing calls to the Gemini API.
///
/// The secret is wiped from memory on drop and never printed by `Debug` or
/// `Display`; both render a short fingerprint instead.
#[derive(Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret. Only the transport layer should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Loggable identifier: the last four characters of the key.
    pub fn fingerprint(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 8 {
            return "****".to_string();
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("****{}", tail)
    }
}

impl From<&str> for Credential {
    fn from(secret: &str) -> Self {
        Self::new(secret)
    }
}

impl From<String> for Credential {
    fn from(secret: String) -> Self {
        Self::new(secret)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credential").field(&self.fingerprint()).finish()
    }
}

impl std::fmt::Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.fingerprint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_impl_masks_secret() {
        let cred = Credential::new("AIzaSyD-secret-key-material-0123456789");
        let debug_str = format!("{:?}", cred);
        let display_str = format!("{}", cred);

        assert!(!debug_str.contains("AIza"));
        assert!(!display_str.contains("secret"));
        assert!(debug_str.contains("6789"));
        assert_eq!(cred.expose(), "AIzaSyD-secret-key-material-0123456789");
    }

    #[test]
    fn test_short_keys_fully_masked() {
        assert_eq!(Credential::new("abc").fingerprint(), "****");
    }
}
