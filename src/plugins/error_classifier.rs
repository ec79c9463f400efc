//! Classification of npm failures
//!
//! With `json=true` npm reports failures as
//! `{"error":{"code":"E404","summary":"...","detail":"..."}}`. Which codes
//! are tolerated depends on the command that produced them; that policy
//! lives entirely in [`ErrorPolicy`].

use crate::security::CommandError;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::trace;

/// Command whose failure is being classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallSite {
    /// `npm view <name> versions`
    VersionLookup,
    /// `npm audit`
    Audit,
}

/// How a structured error code is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Fatal,
    /// Expected condition, the run proceeds
    Benign,
    /// Logged as a warning, the run proceeds
    Warning,
}

/// The `error` object of an npm JSON response
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorBlock {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBlock>,
}

impl ErrorBlock {
    /// Parse a structured error; a payload without an error code is not one
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let response: ErrorResponse = serde_json::from_slice(raw).ok()?;
        response.error.filter(|block| !block.code.is_empty())
    }

    /// Summary and detail joined for display
    pub fn message(&self) -> String {
        match (self.summary.is_empty(), self.detail.is_empty()) {
            (false, false) => format!("{} {}", self.summary, self.detail),
            (false, true) => self.summary.clone(),
            (true, false) => self.detail.clone(),
            (true, true) => self.code.clone(),
        }
    }
}

/// Result of classifying a command outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Benign(ErrorBlock),
    Warning(ErrorBlock),
    Fatal(ErrorBlock),
    /// The command failed without a parsable structured error
    FatalUnstructured,
}

impl Outcome {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_) | Self::FatalUnstructured)
    }
}

/// Lookup table of (call site, code) to disposition
#[derive(Debug, Clone)]
pub struct ErrorPolicy {
    rules: HashMap<(CallSite, String), Disposition>,
    defaults: HashMap<CallSite, Disposition>,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        let mut policy = Self::empty();

        // ENOTFOUND: the registry host could not be resolved
        policy.set(CallSite::VersionLookup, "ENOTFOUND", Disposition::Fatal);
        // E404: the package has never been published
        policy.set(CallSite::VersionLookup, "E404", Disposition::Benign);
        // ENOLOCK: audit requires a lockfile
        policy.set(CallSite::Audit, "ENOLOCK", Disposition::Fatal);
        // ENOAUDIT: the registry does not implement the audit endpoint
        policy.set(CallSite::Audit, "ENOAUDIT", Disposition::Warning);

        policy
    }
}

impl ErrorPolicy {
    /// A policy where every code is fatal
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
            defaults: HashMap::new(),
        }
    }

    /// Add or replace the disposition of a code at a call site
    pub fn set(&mut self, site: CallSite, code: impl Into<String>, disposition: Disposition) {
        self.rules.insert((site, code.into()), disposition);
    }

    /// Disposition for codes without their own rule at `site`
    pub fn set_default(&mut self, site: CallSite, disposition: Disposition) {
        self.defaults.insert(site, disposition);
    }

    pub fn disposition(&self, site: CallSite, code: &str) -> Disposition {
        self.rules
            .get(&(site, code.to_string()))
            .or_else(|| self.defaults.get(&site))
            .copied()
            .unwrap_or(Disposition::Fatal)
    }

    /// Classify the output of a command run at `site`
    ///
    /// Without a command error the outcome is `Success` whatever the output.
    pub fn classify(&self, site: CallSite, raw: &[u8], error: Option<&CommandError>) -> Outcome {
        if error.is_none() {
            return Outcome::Success;
        }

        let Some(block) = ErrorBlock::parse(raw) else {
            trace!(?site, "failure without structured error response");
            return Outcome::FatalUnstructured;
        };

        trace!(?site, code = %block.code, "structured error response");
        match self.disposition(site, &block.code) {
            Disposition::Fatal => Outcome::Fatal(block),
            Disposition::Benign => Outcome::Benign(block),
            Disposition::Warning => Outcome::Warning(block),
        }
    }

    /// Classify a command result, using the captured output of a failure
    pub fn classify_result<T>(&self, site: CallSite, result: &Result<T, CommandError>) -> Outcome {
        match result {
            Ok(_) => Outcome::Success,
            Err(error) => self.classify(site, error.output(), Some(error)),
        }
    }
}
