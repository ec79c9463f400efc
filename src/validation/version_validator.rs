//! Version Validator - Semantic version checks for tags and manifests
//!
//! Two questions are answered here: does a dist-tag look like a version
//! (which npm forbids), and is a manifest version a parsable constraint.
//!
//! # Example
//!
//! ```
//! use npm_publish_plugin::validation::VersionValidator;
//!
//! let validator = VersionValidator::new();
//!
//! assert!(validator.is_version_like("v1.2"));
//! assert!(!validator.is_version_like("beta"));
//! assert!(validator.is_valid_constraint("^1.2.3"));
//! ```

use semver::Version;

/// Validator for semantic versioning
pub struct VersionValidator;

impl Default for VersionValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionValidator {
    /// Create a new VersionValidator
    pub fn new() -> Self {
        Self
    }

    /// Parse a version leniently
    ///
    /// Accepts a leading `v` and missing minor/patch components, the way
    /// users commonly write versions (`v1`, `1.2`).
    pub fn parse_lenient(&self, input: &str) -> Option<Version> {
        let trimmed = input.trim();
        let stripped = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        if let Ok(version) = Version::parse(stripped) {
            return Some(version);
        }

        // split off pre-release/build before padding the numeric core
        let split_at = stripped.find(['-', '+']).unwrap_or(stripped.len());
        let (core, rest) = stripped.split_at(split_at);
        let components: Vec<&str> = core.split('.').collect();

        if components.is_empty()
            || components.len() > 2
            || components
                .iter()
                .any(|c| c.is_empty() || !c.bytes().all(|b| b.is_ascii_digit()))
        {
            return None;
        }

        let mut padded = components.join(".");
        for _ in components.len()..3 {
            padded.push_str(".0");
        }
        padded.push_str(rest);

        Version::parse(&padded).ok()
    }

    /// Whether a string parses as a semantic version
    ///
    /// # Examples
    ///
    /// ```
    /// use npm_publish_plugin::validation::VersionValidator;
    ///
    /// let validator = VersionValidator::new();
    ///
    /// assert!(validator.is_version_like("1.0.0"));
    /// assert!(validator.is_version_like("2.1.0-beta.1"));
    /// assert!(!validator.is_version_like("next"));
    /// ```
    pub fn is_version_like(&self, input: &str) -> bool {
        self.parse_lenient(input).is_some()
    }

    /// Whether a string parses as a version constraint
    ///
    /// Accepts `||` alternatives, `a - b` hyphen ranges, and comma or space
    /// separated comparators. Each comparator is an optional operator followed
    /// by a lenient version, where trailing components may be `x`, `X` or `*`.
    pub fn is_valid_constraint(&self, input: &str) -> bool {
        let input = input.trim();
        !input.is_empty() && input.split("||").all(|range| self.is_valid_range(range.trim()))
    }

    fn is_valid_range(&self, range: &str) -> bool {
        if let Some((low, high)) = range.split_once(" - ") {
            return self.is_valid_comparator(low.trim()) && self.is_valid_comparator(high.trim());
        }

        let mut tokens = range.split([' ', ',']).filter(|t| !t.is_empty());
        let mut count = 0;

        while let Some(token) = tokens.next() {
            // `>= 1.0.0` splits the operator from its version
            let comparator = if token.chars().all(is_operator) {
                match tokens.next() {
                    Some(version) => format!("{token}{version}"),
                    None => return false,
                }
            } else {
                token.to_string()
            };

            if !self.is_valid_comparator(&comparator) {
                return false;
            }
            count += 1;
        }

        count > 0
    }

    fn is_valid_comparator(&self, comparator: &str) -> bool {
        let version = comparator.trim_start_matches(is_operator);
        if is_wildcard(version) {
            return true;
        }

        let parts: Vec<&str> = version.split('.').collect();
        match parts.iter().position(|p| is_wildcard(p)) {
            Some(0) => false,
            Some(at) => {
                parts[at..].iter().all(|p| is_wildcard(p))
                    && self.parse_lenient(&parts[..at].join(".")).is_some()
            }
            None => self.parse_lenient(version).is_some(),
        }
    }
}

fn is_operator(c: char) -> bool {
    matches!(c, '=' | '<' | '>' | '!' | '^' | '~')
}

fn is_wildcard(part: &str) -> bool {
    matches!(part, "x" | "X" | "*")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_versions_are_version_like() {
        let validator = VersionValidator::new();
        assert!(validator.is_version_like("1.0.0"));
        assert!(validator.is_version_like("0.0.1"));
        assert!(validator.is_version_like("1.2.3-alpha.1+build.5"));
    }

    #[test]
    fn test_lenient_forms_are_version_like() {
        let validator = VersionValidator::new();
        assert!(validator.is_version_like("v1.2.3"));
        assert!(validator.is_version_like("1"));
        assert!(validator.is_version_like("1.2"));
        assert!(validator.is_version_like("V2.0-rc.1"));
    }

    #[test]
    fn test_tag_names_are_not_version_like() {
        let validator = VersionValidator::new();
        for tag in ["beta", "latest", "next", "canary-1", "v", "1.2.3.4", "1..2"] {
            assert!(!validator.is_version_like(tag), "{tag}");
        }
    }

    #[test]
    fn test_parse_lenient_pads_components() {
        let validator = VersionValidator::new();
        assert_eq!(
            validator.parse_lenient("v1.2"),
            Some(Version::new(1, 2, 0))
        );
        assert_eq!(validator.parse_lenient("3"), Some(Version::new(3, 0, 0)));
    }

    #[test]
    fn test_valid_constraints() {
        let validator = VersionValidator::new();
        for input in [
            "1.0.0",
            "^1.2.3",
            "~0.4",
            ">=1.0.0, <2.0.0",
            "1.0.0-beta.1",
            "1.0.0+build.5",
            "v1.0.0",
            "=1.0.0",
            "=v1.0.0",
            "1.0.0 - 2.0.0",
            "1.0.0 || 2.0.0",
            "^1.0.0 || >= 2.1.0 < 3",
            "1.2.x",
            "*",
        ] {
            assert!(validator.is_valid_constraint(input), "{input}");
        }
    }

    #[test]
    fn test_invalid_constraints() {
        let validator = VersionValidator::new();
        for input in [
            "one.two",
            "1.0.0.0.0",
            "latest",
            "",
            ">=",
            "1.0.0 ||",
            "x.1",
            "1.x.2",
        ] {
            assert!(!validator.is_valid_constraint(input), "{input}");
        }
    }
}
