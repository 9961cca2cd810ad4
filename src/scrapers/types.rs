use crate::error::ScoutError;
use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

/// Where to search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationFilter {
    CityState { city: String, state: String },
    Zip(String),
}

impl LocationFilter {
    /// Text typed into a site's search box
    pub fn search_text(&self) -> String {
        match self {
            LocationFilter::CityState { city, state } => format!("{city}, {state}"),
            LocationFilter::Zip(zip) => zip.clone(),
        }
    }
}

/// Search parameters shared by both providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub location: LocationFilter,
    pub price_min: Option<u64>,
    pub price_max: Option<u64>,
    /// Include contingent and pending listings
    pub show_contingent: bool,
}

impl SearchQuery {
    /// City and state together take precedence over a zip.
    pub fn new(city: Option<&str>, state: Option<&str>, zip: Option<&str>) -> Result<Self> {
        fn non_empty(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|v| !v.is_empty())
        }

        let location = match (non_empty(city), non_empty(state), non_empty(zip)) {
            (Some(city), Some(state), _) => LocationFilter::CityState {
                city: city.to_string(),
                state: state.to_string(),
            },
            (_, _, Some(zip)) => LocationFilter::Zip(zip.to_string()),
            _ => return Err(ScoutError::MissingLocation.into()),
        };

        Ok(Self {
            location,
            price_min: None,
            price_max: None,
            show_contingent: false,
        })
    }

    pub fn with_price(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.price_min = min;
        self.price_max = max;
        self
    }

    pub fn with_contingent(mut self, show: bool) -> Self {
        self.show_contingent = show;
        self
    }
}

/// Timeouts and pacing for browser work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// How long to wait for a required region to render
    pub element_timeout: Duration,
    /// Ceiling of the random pause after reading a listing
    pub settle_ceiling: Duration,
    /// Ceiling of the random pause between result pages
    pub page_delay_ceiling: Duration,
    /// How long a blocking challenge may stay up
    pub captcha_timeout: Duration,
    pub captcha_poll: Duration,
    /// Pause between repeated key presses while scrolling
    pub scroll_pause: Duration,
    /// Pause after clicks and form input
    pub input_pause: Duration,
    /// Pause for an autocomplete drop-down to settle
    pub autocomplete_pause: Duration,
    /// Scroll increments before harvesting whatever rendered
    pub max_scrolls: usize,
    pub max_pages: Option<usize>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            element_timeout: Duration::from_secs(20),
            settle_ceiling: Duration::from_secs(3),
            page_delay_ceiling: Duration::from_secs(3),
            captcha_timeout: Duration::from_secs(25),
            captcha_poll: Duration::from_secs(1),
            scroll_pause: Duration::from_millis(200),
            input_pause: Duration::from_millis(500),
            autocomplete_pause: Duration::from_secs(3),
            max_scrolls: 200,
            max_pages: None,
        }
    }
}

impl CrawlConfig {
    /// No waiting anywhere; used against fixtures
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            element_timeout: Duration::ZERO,
            settle_ceiling: Duration::ZERO,
            page_delay_ceiling: Duration::ZERO,
            captcha_timeout: Duration::ZERO,
            captcha_poll: Duration::ZERO,
            scroll_pause: Duration::ZERO,
            input_pause: Duration::ZERO,
            autocomplete_pause: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Sleep a random duration in `[0, ceiling]`
pub fn jitter(ceiling: Duration) {
    let ceiling_ms = ceiling.as_millis() as u64;
    if ceiling_ms == 0 {
        return;
    }
    let ms = rand::thread_rng().gen_range(0..=ceiling_ms);
    thread::sleep(Duration::from_millis(ms));
}

/// Fixed pause; zero is a no-op
pub fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_requires_a_location() {
        let err = SearchQuery::new(Some("San Jose"), None, None).unwrap_err();
        assert!(matches!(err.downcast_ref::<ScoutError>(), Some(ScoutError::MissingLocation)));
        assert!(SearchQuery::new(None, None, Some("  ")).is_err());
    }

    #[test]
    fn city_and_state_beat_zip() {
        let query = SearchQuery::new(Some("San Jose"), Some("CA"), Some("95112")).unwrap();
        assert_eq!(
            query.location,
            LocationFilter::CityState {
                city: "San Jose".to_string(),
                state: "CA".to_string()
            }
        );
        assert_eq!(query.location.search_text(), "San Jose, CA");

        let query = SearchQuery::new(None, Some("CA"), Some("10001")).unwrap();
        assert_eq!(query.location, LocationFilter::Zip("10001".to_string()));
    }

    #[test]
    fn location_parts_are_trimmed() {
        let query = SearchQuery::new(Some("  San Jose "), Some("CA\n"), Some(" ")).unwrap();
        assert_eq!(query.location.search_text(), "San Jose, CA");

        let query = SearchQuery::new(Some(""), Some("CA"), Some(" 95112 ")).unwrap();
        assert_eq!(query.location, LocationFilter::Zip("95112".to_string()));
    }

    #[test]
    fn builders_set_filters() {
        let query = SearchQuery::new(None, None, Some("10001"))
            .unwrap()
            .with_price(None, Some(400000))
            .with_contingent(true);
        assert_eq!(query.price_min, None);
        assert_eq!(query.price_max, Some(400000));
        assert!(query.show_contingent);
    }
}
