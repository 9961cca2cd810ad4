use std::time::Duration;
use thiserror::Error;

/// Classified failures that callers branch on.
///
/// Everything else travels as a plain `anyhow::Error`; these are bailed with
/// `anyhow::bail!` and recovered with `downcast_ref` where a caller needs to
/// tell them apart.
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("no extraction rules for host {0:?}")]
    UnsupportedProvider(String),

    #[error("rental listings are not supported: {0}")]
    RentalListing(String),

    #[error("pagination control present but no page count in {0:?}")]
    PaginationInvariant(String),

    #[error("blocking challenge did not clear within {0:?}")]
    ChallengeTimeout(Duration),

    #[error("must provide either city and state or zip")]
    MissingLocation,

    #[error("timed out after {timeout:?} waiting for {selector}")]
    ElementTimeout { selector: String, timeout: Duration },

    #[error("mortgage rate dataset has no 30/20/15-year fixed rows")]
    MissingRates,
}
