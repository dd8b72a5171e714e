use std::env;
use std::time::Duration;

use crate::error::Error;

const DEFAULT_ROUTER_URL: &str = "https://router.hereapi.com/v8/routes";
const DEFAULT_GEOCODE_URL: &str = "https://geocode.search.hereapi.com/v1/geocode";
const DEFAULT_REVGEOCODE_URL: &str = "https://revgeocode.search.hereapi.com/v1/revgeocode";
const DEFAULT_LANG: &str = "en-US";

#[derive(Clone, Debug)]
pub struct HereConfig {
    pub api_key: String,
    pub router_url: String,
    pub geocode_url: String,
    pub revgeocode_url: String,
    pub lang: String,
    pub directions_timeout: Duration,
    pub geocoding_timeout: Duration,
}

impl HereConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            router_url: DEFAULT_ROUTER_URL.into(),
            geocode_url: DEFAULT_GEOCODE_URL.into(),
            revgeocode_url: DEFAULT_REVGEOCODE_URL.into(),
            lang: DEFAULT_LANG.into(),
            directions_timeout: Duration::from_secs(15),
            geocoding_timeout: Duration::from_secs(10),
        }
    }

    /// Reads `HERE_API_KEY` plus the optional endpoint and language overrides.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::new(env::var("HERE_API_KEY")?);

        if let Ok(url) = env::var("HERE_ROUTER_URL") {
            config.router_url = url;
        }
        if let Ok(url) = env::var("HERE_GEOCODE_URL") {
            config.geocode_url = url;
        }
        if let Ok(url) = env::var("HERE_REVGEOCODE_URL") {
            config.revgeocode_url = url;
        }
        if let Ok(lang) = env::var("HERE_LANG") {
            config.lang = lang;
        }

        Ok(config)
    }
}

/// Options handed to the device location provider when a watch starts.
#[derive(Clone, Debug, PartialEq)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    pub distance_filter_m: f64,
    pub interval: Duration,
    pub fastest_interval: Duration,
    pub read_timeout: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            distance_filter_m: 10.0,
            interval: Duration::from_secs(5),
            fastest_interval: Duration::from_secs(2),
            read_timeout: Duration::from_secs(10),
        }
    }
}

/// Shape of the straight-line route drawn when no real route is available.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    pub jitter_degrees: f64,
    pub seed: Option<u64>,
}

impl SimulationConfig {
    pub fn without_jitter() -> Self {
        Self {
            jitter_degrees: 0.0,
            seed: None,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            jitter_degrees: 0.0025,
            seed: None,
        }
    }
}

#[test]
fn defaults() {
    let config = HereConfig::new("key");
    assert_eq!(config.directions_timeout, Duration::from_secs(15));
    assert_eq!(config.geocoding_timeout, Duration::from_secs(10));
    assert_eq!(config.lang, "en-US");

    let options = WatchOptions::default();
    assert!(options.high_accuracy);
    assert_eq!(options.distance_filter_m, 10.0);
    assert_eq!(options.fastest_interval, Duration::from_secs(2));
}
