//! Turns assembled page text into a [`Listing`].
//!
//! Each provider has an ordered table of [`ExtractionRule`]s. Rules are
//! independent: a pattern that fails to compile, a missing match or a value
//! that will not coerce only leaves that one field at its default.

pub mod rules;

use crate::error::ScoutError;
use crate::models::{Listing, Provider};
use anyhow::{anyhow, Context, Result};
use regex::RegexBuilder;
use tracing::{debug, error};

use rules::{rules_for, ExtractionRule, FieldKind, FieldValue};

impl FieldKind {
    /// Coerce a captured string, dropping thousands separators and spaces
    /// before numeric parsing.
    pub fn coerce(self, raw: &str) -> Result<FieldValue> {
        match self {
            FieldKind::Text => Ok(FieldValue::Text(raw.trim().to_string())),
            FieldKind::Integer => {
                let cleaned = strip_separators(raw);
                cleaned
                    .parse::<i64>()
                    .map(FieldValue::Integer)
                    .with_context(|| format!("{cleaned:?} is not an integer"))
            }
            FieldKind::Decimal => {
                let cleaned = strip_separators(raw);
                cleaned
                    .parse::<f64>()
                    .map(FieldValue::Decimal)
                    .with_context(|| format!("{cleaned:?} is not a number"))
            }
        }
    }
}

fn strip_separators(raw: &str) -> String {
    raw.chars().filter(|c| *c != ',' && *c != ' ').collect()
}

/// Resolve one rule. `Ok(None)` means the pattern did not match.
pub fn resolve(rule: &ExtractionRule, text: &str) -> Result<Option<FieldValue>> {
    let regex = RegexBuilder::new(rule.pattern)
        .multi_line(rule.flags.multi_line)
        .case_insensitive(rule.flags.case_insensitive)
        .build()?;

    let Some(captures) = regex.captures(text) else {
        return Ok(None);
    };
    let raw = captures
        .get(rule.group)
        .ok_or_else(|| anyhow!("pattern has no capture group {}", rule.group))?
        .as_str();

    rule.field.kind().coerce(raw).map(Some)
}

/// Apply a rule table to `text`. Never fails; unresolved fields keep defaults.
pub fn extract_with(rules: &[ExtractionRule], text: &str) -> Listing {
    let mut listing = Listing::default();

    for rule in rules {
        match resolve(rule, text) {
            Ok(Some(value)) => listing.set_field(rule.field, value),
            Ok(None) => debug!("no match for {}", rule.field.name()),
            Err(e) => {
                error!("failed to parse {} with regex \"{}\"!", rule.field.name(), rule.pattern);
                debug!("failed to parse {} with regex \"{}\": {:#}", rule.field.name(), rule.pattern, e);
            }
        }
    }

    listing
}

/// Extract a listing from text rendered on `host`.
pub fn extract(text: &str, host: &str) -> Result<Listing> {
    let provider =
        Provider::from_host(host).ok_or_else(|| ScoutError::UnsupportedProvider(host.to_string()))?;
    Ok(extract_with(rules_for(provider), text))
}
