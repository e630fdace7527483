use chrono::prelude::*;
use chrono::DateTime;

use serde::ser::{Serialize, Serializer};
use std::fmt;

/// Server wall-clock time, in seconds since the Unix epoch.
///
/// The rendered text is fixed at construction and is the only form that
/// ever goes into a canonical message: the shortest decimal that parses back
/// to the same `f64`, with no exponent and always with a fractional part
/// (`1700000000` renders as `1700000000.0`). The JSON `timestamp` number
/// serializes to the same digits.
#[derive(Debug, Clone)]
pub struct Timestamp {
    inner: f64,
    rendered: String,
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(self.secs())
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

impl Timestamp {
    /// Read the clock. Call once per signing request.
    pub fn now() -> Self {
        Self::from_datetime(&Utc::now())
    }

    pub fn from_datetime(time: &DateTime<Utc>) -> Self {
        let secs = time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) / 1e9;
        Self::from_secs(secs)
    }

    pub fn from_secs(secs: f64) -> Self {
        Self {
            inner: secs,
            rendered: render(secs),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    pub fn secs(&self) -> f64 {
        self.inner
    }
}

fn render(secs: f64) -> String {
    // `Display` for f64 is shortest round-trip and never uses an exponent
    let mut rendered = format!("{}", secs);
    if secs.is_finite() && !rendered.contains('.') {
        rendered.push_str(".0");
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rocket::serde::json;

    #[test]
    fn whole_seconds_keep_a_fraction() {
        assert_eq!(Timestamp::from_secs(1234567890.0).as_str(), "1234567890.0");
        assert_eq!(Timestamp::from_secs(0.0).as_str(), "0.0");
    }

    #[test]
    fn fractions_are_shortest_round_trip() {
        let ts = Timestamp::from_secs(1700000000.123456);
        assert_eq!(ts.as_str(), "1700000000.123456");
        assert_eq!(ts.as_str().parse::<f64>().unwrap(), ts.secs());
    }

    #[test]
    fn no_exponent_for_large_values() {
        let rendered = Timestamp::from_secs(1e15).to_string();
        assert_eq!(rendered, "1000000000000000.0");
        assert!(!rendered.contains('e'));
    }

    #[test]
    fn from_datetime_keeps_subseconds() {
        let time = Utc.timestamp_opt(1700000000, 250_000_000).unwrap();
        assert_eq!(Timestamp::from_datetime(&time).as_str(), "1700000000.25");
    }

    #[test]
    fn json_number_matches_rendered_text() {
        for secs in &[1700000000.0, 1700000000.5, 1723456789.0123456] {
            let ts = Timestamp::from_secs(*secs);
            assert_eq!(json::to_string(&ts).unwrap(), ts.as_str());
        }
    }

    #[test]
    fn now_is_after_2020() {
        assert!(Timestamp::now().secs() > 1577836800.0);
    }
}
