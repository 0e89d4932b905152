// API models and data fetching for the USGS earthquake feed
// USGS FDSN event web service: https://earthquake.usgs.gov/fdsnws/event/1/
//
// Query endpoint:
// - https://earthquake.usgs.gov/fdsnws/event/1/query?format=geojson&limit=<n>&minmag=<m>&orderby=<key>
//
// Response shape (GeoJSON):
// - {"features": [{"properties": {"mag": <number>, "place": <string>,
//    "time": <epoch ms>, "url": <string>}}, ...]}

use chrono::{Local, TimeZone, Utc};
use reqwest::blocking;
use serde::{Deserialize, Serialize};

// ============================================================================
// Data Structures
// ============================================================================

/// One seismic event, copied verbatim from the feed. Built fresh per fetch
/// cycle and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Earthquake {
    pub magnitude: f64,
    pub place: String,
    /// Epoch milliseconds, UTC.
    pub timestamp: i64,
    pub url: String,
}

/// Presentation-ready fields derived from one Earthquake. Computed at
/// consumption time, never during parsing.
#[derive(Debug, Clone, Serialize)]
pub struct EarthquakeView {
    pub magnitude: String,
    pub bucket: String,
    pub color: String,
    pub location_offset: String,
    pub primary_location: String,
    pub date: String,
    pub time: String,
    pub url: String,
}

/// Query parameters for the USGS endpoint. All plain strings, passed through
/// unvalidated; a bad minmag or orderby surfaces later as an HTTP- or
/// parse-level failure, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedParams {
    pub format: String,
    pub limit: String,
    pub minmag: String,
    pub orderby: String,
}

impl Default for FeedParams {
    fn default() -> Self {
        FeedParams {
            format: "geojson".to_string(),
            limit: "30".to_string(),
            minmag: "5".to_string(),
            orderby: "time".to_string(),
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum QuakeError {
    NetworkError(String),
    HttpError(String),
    ParseError(String),
}

impl std::fmt::Display for QuakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuakeError::NetworkError(e) => write!(f, "Network error: {}", e),
            QuakeError::HttpError(e) => write!(f, "HTTP error: {}", e),
            QuakeError::ParseError(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for QuakeError {}

pub type Result<T> = std::result::Result<T, QuakeError>;

// ============================================================================
// Main Implementation
// ============================================================================

pub struct UsgsModels;

impl UsgsModels {
    pub const USGS_URL: &'static str = "https://earthquake.usgs.gov/fdsnws/event/1/query";
    const CONNECT_TIMEOUT_MS: u64 = 15_000;
    const READ_TIMEOUT_MS: u64 = 10_000;

    // ========================================================================
    // URL Builder
    // ========================================================================

    /// Compose the query URL from a base endpoint and a parameter set. The
    /// values are appended as-is; no semantic checking happens here.
    pub fn build_query_url(base: &str, params: &FeedParams) -> Result<String> {
        let url = reqwest::Url::parse_with_params(
            base,
            &[
                ("format", params.format.as_str()),
                ("limit", params.limit.as_str()),
                ("minmag", params.minmag.as_str()),
                ("orderby", params.orderby.as_str()),
            ],
        )
        .map_err(|e| QuakeError::NetworkError(format!("Error creating URL: {}", e)))?;

        Ok(url.to_string())
    }

    // ========================================================================
    // HTTP Fetcher
    // ========================================================================

    fn http_client() -> Result<blocking::Client> {
        blocking::Client::builder()
            .connect_timeout(std::time::Duration::from_millis(Self::CONNECT_TIMEOUT_MS))
            .timeout(std::time::Duration::from_millis(Self::READ_TIMEOUT_MS))
            .build()
            .map_err(|e| QuakeError::NetworkError(format!("Failed to create HTTP client: {}", e)))
    }

    fn try_http_request(url: &str) -> Result<String> {
        let client = Self::http_client()?;

        let response = client
            .get(url)
            .send()
            .map_err(|e| QuakeError::NetworkError(format!("Error making HTTP request: {}", e)))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(QuakeError::HttpError(format!(
                "Error response code is: {}",
                response.status()
            )));
        }

        response
            .text()
            .map_err(|e| QuakeError::NetworkError(format!("Failed to read response body: {}", e)))
    }

    /// Issue one GET against the given URL and return the full body text.
    /// Non-200 statuses and network-level failures (DNS, connect, timeout,
    /// malformed URL) are logged and degrade to an empty body; nothing is
    /// raised to the caller. The connection is released on every exit path.
    pub fn make_http_request(url: &str) -> String {
        Self::try_http_request(url).unwrap_or_else(|e| {
            eprintln!("⚠️  {}", e);
            String::new()
        })
    }

    // ========================================================================
    // Feed Parser
    // ========================================================================

    fn log_parse_failure(detail: String) {
        eprintln!("⚠️  {}", QuakeError::ParseError(detail));
    }

    /// Parse the response body into an ordered list of earthquakes.
    ///
    /// Fail-partial: features are consumed element-by-element and parsing
    /// stops at the first structural failure (wrong top-level shape, missing
    /// or mistyped field). Everything built before that point is kept; the
    /// offending element and every element after it are dropped. The failure
    /// is logged, never raised.
    pub fn extract_features_from_json(body: &str) -> Vec<Earthquake> {
        let mut earthquakes = Vec::new();

        if body.trim().is_empty() {
            return earthquakes;
        }

        let document: serde_json::Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => {
                Self::log_parse_failure(format!(
                    "Problem parsing the earthquake JSON results: {}",
                    e
                ));
                return earthquakes;
            }
        };

        let features = match document.get("features").and_then(|f| f.as_array()) {
            Some(array) => array,
            None => {
                Self::log_parse_failure("Feed has no \"features\" array".to_string());
                return earthquakes;
            }
        };

        for (index, feature) in features.iter().enumerate() {
            let properties = match feature.get("properties").and_then(|p| p.as_object()) {
                Some(properties) => properties,
                None => {
                    Self::log_parse_failure(format!(
                        "Feature {} has no \"properties\" object, keeping {} records",
                        index,
                        earthquakes.len()
                    ));
                    break;
                }
            };

            let magnitude = properties.get("mag").and_then(|m| m.as_f64());
            let place = properties.get("place").and_then(|p| p.as_str());
            let timestamp = properties.get("time").and_then(|t| t.as_i64());
            let url = properties.get("url").and_then(|u| u.as_str());

            match (magnitude, place, timestamp, url) {
                (Some(magnitude), Some(place), Some(timestamp), Some(url)) => {
                    earthquakes.push(Earthquake {
                        magnitude,
                        place: place.to_string(),
                        timestamp,
                        url: url.to_string(),
                    });
                }
                _ => {
                    Self::log_parse_failure(format!(
                        "Feature {} is missing an expected property, keeping {} records",
                        index,
                        earthquakes.len()
                    ));
                    break;
                }
            }
        }

        earthquakes
    }

    /// The exposed pipeline: fetch the feed at `url` and parse it. May return
    /// an empty list or a partial prefix of the true feed; never errors.
    pub fn fetch_earthquake_data(url: &str) -> Vec<Earthquake> {
        let body = Self::make_http_request(url);
        Self::extract_features_from_json(&body)
    }

    // ========================================================================
    // Derived Field Calculator
    // ========================================================================

    /// Format a magnitude to one decimal place with half-up rounding
    /// (3.0 -> "3.0", 3.46 -> "3.5", 9.96 -> "10.0").
    pub fn format_magnitude(magnitude: f64) -> String {
        format!("{:.1}", (magnitude * 10.0).round() / 10.0)
    }

    /// Severity bucket from floor(magnitude): everything at or below 1 shares
    /// the lowest bucket, 2 through 9 get their own, 10 and up share "10+".
    pub fn magnitude_bucket(magnitude: f64) -> &'static str {
        match magnitude.floor() as i64 {
            f if f <= 1 => "1",
            2 => "2",
            3 => "3",
            4 => "4",
            5 => "5",
            6 => "6",
            7 => "7",
            8 => "8",
            9 => "9",
            _ => "10+",
        }
    }

    /// Fixed severity color for a magnitude, blue (low) to red (high).
    pub fn magnitude_color(magnitude: f64) -> &'static str {
        match Self::magnitude_bucket(magnitude) {
            "1" => "#4A7BA6",
            "2" => "#04B4B3",
            "3" => "#10CAC9",
            "4" => "#F5A623",
            "5" => "#FF7D50",
            "6" => "#FC6644",
            "7" => "#E75F40",
            "8" => "#E13A20",
            "9" => "#D93218",
            _ => "#C03823",
        }
    }

    /// Split a place description into an offset segment and a primary
    /// location. A place starting with a decimal digit is assumed to encode
    /// "<offset> of <location>": the offset runs through the end of the first
    /// literal "of", and the primary location is the remainder, trimmed.
    /// Otherwise the offset is the constant "Near" and the place is returned
    /// unchanged.
    ///
    /// A digit-leading place with no "of" degenerates to a one-character
    /// offset and a mangled primary location. Known fragility, kept as-is.
    pub fn split_place(place: &str) -> (String, String) {
        let starts_with_digit = place
            .chars()
            .next()
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false);

        if starts_with_digit {
            let offset_end = place.find("of").map(|i| i + 2).unwrap_or(1);
            let offset = place[..offset_end].to_string();
            let primary = place.replace(&offset, "").trim().to_string();
            (offset, primary)
        } else {
            ("Near".to_string(), place.to_string())
        }
    }

    /// Calendar date in the local time zone, e.g. "Mar 3, 2018".
    pub fn format_date(timestamp_ms: i64) -> String {
        match Utc.timestamp_millis_opt(timestamp_ms).single() {
            Some(dt) => dt.with_timezone(&Local).format("%b %-d, %Y").to_string(),
            None => format!("Invalid timestamp: {}", timestamp_ms),
        }
    }

    /// 12-hour clock time with AM/PM marker in the local time zone,
    /// e.g. "3:35 PM".
    pub fn format_time(timestamp_ms: i64) -> String {
        match Utc.timestamp_millis_opt(timestamp_ms).single() {
            Some(dt) => dt.with_timezone(&Local).format("%-I:%M %p").to_string(),
            None => format!("Invalid timestamp: {}", timestamp_ms),
        }
    }

    /// All derived fields for one record. Pure, safe to recompute repeatedly
    /// and concurrently; the record itself is untouched.
    pub fn to_view(quake: &Earthquake) -> EarthquakeView {
        let (location_offset, primary_location) = Self::split_place(&quake.place);

        EarthquakeView {
            magnitude: Self::format_magnitude(quake.magnitude),
            bucket: Self::magnitude_bucket(quake.magnitude).to_string(),
            color: Self::magnitude_color(quake.magnitude).to_string(),
            location_offset,
            primary_location,
            date: Self::format_date(quake.timestamp),
            time: Self::format_time(quake.timestamp),
            url: quake.url.clone(),
        }
    }

    pub fn get_current_timestamp() -> i64 {
        Utc::now().timestamp()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(mag: f64, place: &str, time: i64, url: &str) -> String {
        format!(
            r#"{{"properties": {{"mag": {}, "place": "{}", "time": {}, "url": "{}"}}}}"#,
            mag, place, time, url
        )
    }

    #[test]
    fn parser_keeps_all_features_in_order() {
        let body = format!(
            r#"{{"features": [{}, {}, {}]}}"#,
            feature(6.2, "38km SE of Lima, Peru", 1520000000000, "https://usgs.gov/a"),
            feature(4.5, "Reykjavik, Iceland", 1520000001000, "https://usgs.gov/b"),
            feature(7.8, "102km NNE of Suva, Fiji", 1520000002000, "https://usgs.gov/c"),
        );

        let quakes = UsgsModels::extract_features_from_json(&body);

        assert_eq!(quakes.len(), 3);
        assert_eq!(quakes[0].magnitude, 6.2);
        assert_eq!(quakes[0].place, "38km SE of Lima, Peru");
        assert_eq!(quakes[0].timestamp, 1520000000000);
        assert_eq!(quakes[0].url, "https://usgs.gov/a");
        assert_eq!(quakes[1].place, "Reykjavik, Iceland");
        assert_eq!(quakes[2].place, "102km NNE of Suva, Fiji");
    }

    #[test]
    fn empty_body_yields_empty_list() {
        assert!(UsgsModels::extract_features_from_json("").is_empty());
        assert!(UsgsModels::extract_features_from_json("   \n ").is_empty());
    }

    #[test]
    fn malformed_json_text_yields_empty_list() {
        assert!(UsgsModels::extract_features_from_json("{not json").is_empty());
    }

    #[test]
    fn missing_features_array_yields_empty_list() {
        assert!(UsgsModels::extract_features_from_json(r#"{"metadata": {}}"#).is_empty());
        assert!(UsgsModels::extract_features_from_json(r#"{"features": 12}"#).is_empty());
    }

    #[test]
    fn parse_stops_at_first_malformed_feature() {
        // Two good features, then one with a mistyped mag, then another good
        // one. The bad element and everything after it are dropped.
        let body = format!(
            r#"{{"features": [{}, {}, {{"properties": {{"mag": "big", "place": "x", "time": 1, "url": "u"}}}}, {}]}}"#,
            feature(5.0, "a", 1, "u1"),
            feature(5.1, "b", 2, "u2"),
            feature(5.2, "c", 3, "u3"),
        );

        let quakes = UsgsModels::extract_features_from_json(&body);

        assert_eq!(quakes.len(), 2);
        assert_eq!(quakes[0].url, "u1");
        assert_eq!(quakes[1].url, "u2");
    }

    #[test]
    fn parse_stops_when_properties_is_not_an_object() {
        let body = format!(
            r#"{{"features": [{}, {{"properties": []}}, {}]}}"#,
            feature(5.0, "a", 1, "u1"),
            feature(5.2, "c", 3, "u3"),
        );

        let quakes = UsgsModels::extract_features_from_json(&body);

        assert_eq!(quakes.len(), 1);
        assert_eq!(quakes[0].place, "a");
    }

    #[test]
    fn parse_stops_when_a_property_is_missing() {
        let body = format!(
            r#"{{"features": [{}, {{"properties": {{"mag": 5.5, "place": "x", "time": 1}}}}]}}"#,
            feature(5.0, "a", 1, "u1"),
        );

        assert_eq!(UsgsModels::extract_features_from_json(&body).len(), 1);
    }

    #[test]
    fn magnitude_formats_to_one_decimal_half_up() {
        assert_eq!(UsgsModels::format_magnitude(3.0), "3.0");
        assert_eq!(UsgsModels::format_magnitude(3.46), "3.5");
        assert_eq!(UsgsModels::format_magnitude(9.96), "10.0");
        assert_eq!(UsgsModels::format_magnitude(0.25), "0.3");
    }

    #[test]
    fn magnitude_buckets_follow_floor() {
        assert_eq!(UsgsModels::magnitude_bucket(0.5), "1");
        assert_eq!(UsgsModels::magnitude_bucket(1.9), "1");
        assert_eq!(UsgsModels::magnitude_bucket(2.0), "2");
        assert_eq!(UsgsModels::magnitude_bucket(9.99), "9");
        assert_eq!(UsgsModels::magnitude_bucket(10.2), "10+");
    }

    #[test]
    fn magnitude_colors_track_buckets() {
        assert_eq!(UsgsModels::magnitude_color(1.9), "#4A7BA6");
        assert_eq!(UsgsModels::magnitude_color(9.0), "#D93218");
        assert_eq!(UsgsModels::magnitude_color(11.0), "#C03823");
        assert_ne!(
            UsgsModels::magnitude_color(2.5),
            UsgsModels::magnitude_color(3.5)
        );
    }

    #[test]
    fn place_with_offset_splits_on_of() {
        let (offset, primary) = UsgsModels::split_place("38km SE of Lima, Peru");
        assert_eq!(offset, "38km SE of");
        assert_eq!(primary, "Lima, Peru");
    }

    #[test]
    fn bare_place_gets_near_label() {
        let (offset, primary) = UsgsModels::split_place("Reykjavik, Iceland");
        assert_eq!(offset, "Near");
        assert_eq!(primary, "Reykjavik, Iceland");
    }

    #[test]
    fn digit_leading_place_without_of_degenerates() {
        // Known fragility carried over unchanged: the offset collapses to the
        // first character and that character is stripped from the remainder.
        let (offset, primary) = UsgsModels::split_place("10km from Lima");
        assert_eq!(offset, "1");
        assert_eq!(primary, "0km from Lima");
    }

    #[test]
    fn query_url_round_trips_its_parameters() {
        let params = FeedParams {
            format: "geojson".to_string(),
            limit: "10".to_string(),
            minmag: "5".to_string(),
            orderby: "time".to_string(),
        };

        let url = UsgsModels::build_query_url(UsgsModels::USGS_URL, &params).unwrap();
        let parsed = reqwest::Url::parse(&url).unwrap();
        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert_eq!(
            pairs,
            vec![
                ("format".to_string(), "geojson".to_string()),
                ("limit".to_string(), "10".to_string()),
                ("minmag".to_string(), "5".to_string()),
                ("orderby".to_string(), "time".to_string()),
            ]
        );
    }

    #[test]
    fn date_and_time_render_in_expected_shape() {
        // 2018-03-02T14:00:00Z; the local zone can shift the day but not the
        // year, so only the shape is asserted.
        let ts = 1519999200000;

        let date = UsgsModels::format_date(ts);
        assert!(date.contains(", 2018"), "unexpected date: {}", date);
        assert!(date.chars().next().unwrap().is_ascii_alphabetic());

        let time = UsgsModels::format_time(ts);
        assert!(time.contains(':'), "unexpected time: {}", time);
        assert!(time.ends_with("AM") || time.ends_with("PM"), "unexpected time: {}", time);
    }

    #[test]
    fn view_derives_all_presentation_fields() {
        let quake = Earthquake {
            magnitude: 6.24,
            place: "38km SE of Lima, Peru".to_string(),
            timestamp: 1519999200000,
            url: "https://usgs.gov/a".to_string(),
        };

        let view = UsgsModels::to_view(&quake);

        assert_eq!(view.magnitude, "6.2");
        assert_eq!(view.bucket, "6");
        assert_eq!(view.color, "#FC6644");
        assert_eq!(view.location_offset, "38km SE of");
        assert_eq!(view.primary_location, "Lima, Peru");
        assert_eq!(view.url, "https://usgs.gov/a");
    }
}
