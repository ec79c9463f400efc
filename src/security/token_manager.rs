//! Secret masking for log output
//!
//! Credentials are held as `secrecy::SecretString` everywhere else. The only
//! place their plain value can leak is npm's own output, which is traced at
//! TRACE level; [`SecretMasker`] scrubs it first.

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};

/// Replaces known secret values with a masked form
///
/// # Examples
///
/// ```
/// use npm_publish_plugin::security::SecretMasker;
/// use secrecy::SecretString;
///
/// let mut masker = SecretMasker::new();
/// masker.add(&SecretString::new("npm_abcdef123456".into()));
/// assert_eq!(masker.mask("token=npm_abcdef123456"), "token=npm...456");
/// ```
#[derive(Debug, Default)]
pub struct SecretMasker {
    patterns: Vec<(Regex, String)>,
}

impl SecretMasker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret; empty secrets are ignored
    pub fn add(&mut self, secret: &SecretString) {
        self.add_plain(secret.expose_secret());
    }

    /// Register a derived value such as an encoded credential
    pub fn add_plain(&mut self, value: &str) {
        if value.is_empty() {
            return;
        }

        if let Ok(regex) = Regex::new(&regex::escape(value)) {
            self.patterns.push((regex, mask_token(value)));
        }
    }

    /// Masks all registered secrets in a string
    pub fn mask(&self, text: &str) -> String {
        let mut masked = text.to_string();

        for (regex, replacement) in &self.patterns {
            masked = regex
                .replace_all(&masked, replacement.as_str())
                .into_owned();
        }

        masked
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Masks a token for safe display
///
/// Tokens shorter than 10 characters are fully masked as "****".
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 10 {
        return "****".to_string();
    }

    let prefix: String = chars[..3].iter().collect();
    let suffix: String = chars[chars.len() - 3..].iter().collect();
    format!("{prefix}...{suffix}")
}
