//! Bounded telemetry sample buffer
//!
//! [`TelemetryBuffer`] is the single store every downstream view reads from.
//! It keeps samples in arrival order and evicts the oldest sample once the
//! configured capacity is exceeded.

use std::collections::VecDeque;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

use crate::error::{ObdWatchError, Result};

/// Default number of samples retained for display
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// Upper bound on the telemetry buffer capacity
pub const MAX_BUFFER_CAPACITY: usize = 100_000;

static NUMERIC_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Extract the first signed decimal number contained in `raw`.
///
/// Returns `None` when `raw` contains no digits at all. A reading of `"0"`
/// yields `Some(0.0)`, so callers can tell a zero reading from a reading
/// that carried no number.
///
/// # Examples
///
/// ```
/// use obdwatch::session::buffer::extract_numeric;
///
/// assert_eq!(extract_numeric("12.5V"), Some(12.5));
/// assert_eq!(extract_numeric("RPM 900"), Some(900.0));
/// assert_eq!(extract_numeric("temp -3 C"), Some(-3.0));
/// assert_eq!(extract_numeric("OK"), None);
/// ```
pub fn extract_numeric(raw: &str) -> Option<f64> {
    let pattern = NUMERIC_PATTERN.get_or_init(|| {
        Regex::new(r"[-+]?(?:\d+(?:\.\d+)?|\.\d+)").expect("numeric pattern is a valid regex")
    });
    pattern.find(raw).and_then(|m| m.as_str().parse().ok())
}

/// Parse the timestamp string sent by the backend.
///
/// Accepts RFC 3339 as well as the naive ISO 8601 form Python's
/// `datetime.isoformat()` produces (interpreted as UTC). Anything else is
/// stamped with the time of receipt.
pub fn parse_timestamp(value: &str) -> DateTime<Utc> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return parsed.with_timezone(&Utc);
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return naive.and_utc();
        }
    }

    tracing::debug!("Unparseable sample timestamp {:?}, using receive time", value);
    Utc::now()
}

/// One decoded telemetry reading. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySample {
    timestamp: DateTime<Utc>,
    raw: String,
    numeric_value: Option<f64>,
}

impl TelemetrySample {
    /// Build a sample, deriving the numeric value from `raw`
    pub fn new(timestamp: DateTime<Utc>, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let numeric_value = extract_numeric(&raw);
        Self {
            timestamp,
            raw,
            numeric_value,
        }
    }

    /// Build a sample from the backend's timestamp string
    pub fn from_wire(timestamp: &str, raw: impl Into<String>) -> Self {
        Self::new(parse_timestamp(timestamp), raw)
    }

    /// When the reading was taken
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The reading as received
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// First number found in the reading, if any
    pub fn numeric_value(&self) -> Option<f64> {
        self.numeric_value
    }
}

/// Summary figures for the statistics panel
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelemetryStats {
    /// Samples currently buffered
    pub count: usize,
    /// Samples that carry a numeric value
    pub numeric_count: usize,
    /// Most recent numeric value
    pub latest: Option<f64>,
    /// Smallest numeric value
    pub min: Option<f64>,
    /// Largest numeric value
    pub max: Option<f64>,
    /// Mean of all numeric values
    pub mean: Option<f64>,
}

/// Bounded FIFO store of telemetry samples.
///
/// The buffer never holds more than `capacity` samples after a push. Lowering
/// the capacity does not drop anything until the next push, which then
/// evicts down to the new bound.
#[derive(Debug, Clone)]
pub struct TelemetryBuffer {
    samples: VecDeque<TelemetrySample>,
    capacity: usize,
}

impl TelemetryBuffer {
    /// Create an empty buffer
    ///
    /// # Errors
    ///
    /// Returns [`ObdWatchError::InvalidCapacity`] when `capacity` is zero or
    /// above [`MAX_BUFFER_CAPACITY`].
    ///
    /// # Examples
    ///
    /// ```
    /// use obdwatch::session::buffer::TelemetryBuffer;
    ///
    /// let buffer = TelemetryBuffer::new(3).unwrap();
    /// assert_eq!(buffer.count(), 0);
    /// assert!(TelemetryBuffer::new(0).is_err());
    /// ```
    pub fn new(capacity: usize) -> Result<Self> {
        validate_capacity(capacity)?;
        Ok(Self {
            samples: VecDeque::with_capacity(capacity.min(DEFAULT_BUFFER_CAPACITY)),
            capacity,
        })
    }

    /// Append a sample, evicting the oldest entries beyond capacity
    pub fn push(&mut self, sample: TelemetrySample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// The last `min(n, count())` samples, oldest first
    pub fn recent(&self, n: usize) -> impl DoubleEndedIterator<Item = &TelemetrySample> + ExactSizeIterator {
        let skip = self.samples.len().saturating_sub(n);
        self.samples.iter().skip(skip)
    }

    /// All buffered samples, oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &TelemetrySample> + ExactSizeIterator {
        self.samples.iter()
    }

    /// Most recently pushed sample
    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.samples.back()
    }

    /// Remove every sample
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Number of buffered samples
    pub fn count(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Current capacity bound
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the capacity; takes effect on the next push
    ///
    /// # Errors
    ///
    /// Returns [`ObdWatchError::InvalidCapacity`] when `capacity` is zero or
    /// above [`MAX_BUFFER_CAPACITY`].
    pub fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        validate_capacity(capacity)?;
        self.capacity = capacity;
        Ok(())
    }

    /// Compute summary statistics over the buffered numeric values
    pub fn stats(&self) -> TelemetryStats {
        let mut stats = TelemetryStats {
            count: self.samples.len(),
            ..TelemetryStats::default()
        };

        let mut sum = 0.0;
        for value in self.samples.iter().filter_map(TelemetrySample::numeric_value) {
            stats.numeric_count += 1;
            sum += value;
            stats.latest = Some(value);
            stats.min = Some(stats.min.map_or(value, |m| m.min(value)));
            stats.max = Some(stats.max.map_or(value, |m| m.max(value)));
        }

        if stats.numeric_count > 0 {
            stats.mean = Some(sum / stats.numeric_count as f64);
        }
        stats
    }
}

fn validate_capacity(capacity: usize) -> Result<()> {
    if capacity == 0 || capacity > MAX_BUFFER_CAPACITY {
        return Err(ObdWatchError::InvalidCapacity(capacity).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(raw: &str) -> TelemetrySample {
        TelemetrySample::new(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(), raw)
    }

    fn raws(buffer: &TelemetryBuffer) -> Vec<&str> {
        buffer.iter().map(TelemetrySample::raw).collect()
    }

    #[test]
    fn test_extract_numeric_variants() {
        assert_eq!(extract_numeric("12.5V"), Some(12.5));
        assert_eq!(extract_numeric("RPM 900"), Some(900.0));
        assert_eq!(extract_numeric("-3"), Some(-3.0));
        assert_eq!(extract_numeric("+7 kPa"), Some(7.0));
        assert_eq!(extract_numeric("ratio .75"), Some(0.75));
        assert_eq!(extract_numeric("0"), Some(0.0));
        assert_eq!(extract_numeric("OK"), None);
        assert_eq!(extract_numeric(""), None);
    }

    #[test]
    fn test_extract_numeric_takes_first_match() {
        assert_eq!(extract_numeric("41 0C 1A F8"), Some(41.0));
        assert_eq!(extract_numeric("speed 55 limit 65"), Some(55.0));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T10:00:00Z"), expected);
        assert_eq!(parse_timestamp("2024-05-01T12:00:00+02:00"), expected);
        assert_eq!(parse_timestamp("2024-05-01T10:00:00"), expected);
        assert_eq!(parse_timestamp("2024-05-01 10:00:00.000"), expected);
    }

    #[test]
    fn test_parse_timestamp_fallback_is_recent() {
        let before = Utc::now();
        let parsed = parse_timestamp("yesterday-ish");
        assert!(parsed >= before);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = TelemetryBuffer::new(0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ObdWatchError>(),
            Some(ObdWatchError::InvalidCapacity(0))
        ));

        let mut buffer = TelemetryBuffer::new(2).unwrap();
        assert!(buffer.set_capacity(0).is_err());
        assert_eq!(buffer.capacity(), 2);
    }

    #[test]
    fn test_capacity_above_maximum_rejected() {
        assert!(TelemetryBuffer::new(MAX_BUFFER_CAPACITY).is_ok());
        assert!(TelemetryBuffer::new(MAX_BUFFER_CAPACITY + 1).is_err());

        let mut buffer = TelemetryBuffer::new(10).unwrap();
        let err = buffer.set_capacity(5_000_000).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ObdWatchError>(),
            Some(ObdWatchError::InvalidCapacity(5_000_000))
        ));
        assert_eq!(buffer.capacity(), 10);
    }

    #[test]
    fn test_capacity_invariant_holds_after_every_push() {
        let mut buffer = TelemetryBuffer::new(4).unwrap();
        for i in 0..20 {
            buffer.push(sample(&format!("reading {}", i)));
            assert!(buffer.count() <= 4);
        }
        assert_eq!(buffer.count(), 4);
    }

    #[test]
    fn test_fifo_eviction() {
        let mut buffer = TelemetryBuffer::new(3).unwrap();
        for raw in ["s1", "s2", "s3", "s4"] {
            buffer.push(sample(raw));
        }
        assert_eq!(raws(&buffer), vec!["s2", "s3", "s4"]);
    }

    #[test]
    fn test_end_to_end_numeric_values() {
        let mut buffer = TelemetryBuffer::new(3).unwrap();
        for raw in ["12.5V", "RPM 900", "-3", "OK"] {
            buffer.push(sample(raw));
        }
        assert_eq!(raws(&buffer), vec!["RPM 900", "-3", "OK"]);
        let values: Vec<Option<f64>> = buffer.iter().map(|s| s.numeric_value()).collect();
        assert_eq!(values, vec![Some(900.0), Some(-3.0), None]);
    }

    #[test]
    fn test_recent_returns_tail_in_order() {
        let mut buffer = TelemetryBuffer::new(10).unwrap();
        for raw in ["a", "b", "c", "d"] {
            buffer.push(sample(raw));
        }
        let tail: Vec<&str> = buffer.recent(2).map(TelemetrySample::raw).collect();
        assert_eq!(tail, vec!["c", "d"]);

        let all: Vec<&str> = buffer.recent(50).map(TelemetrySample::raw).collect();
        assert_eq!(all, vec!["a", "b", "c", "d"]);

        assert_eq!(buffer.recent(0).count(), 0);
        assert_eq!(buffer.count(), 4);
    }

    #[test]
    fn test_shrinking_capacity_applies_on_next_push() {
        let mut buffer = TelemetryBuffer::new(5).unwrap();
        for raw in ["a", "b", "c", "d", "e"] {
            buffer.push(sample(raw));
        }

        buffer.set_capacity(2).unwrap();
        assert_eq!(buffer.count(), 5);

        buffer.push(sample("f"));
        assert_eq!(raws(&buffer), vec!["e", "f"]);
    }

    #[test]
    fn test_growing_capacity_keeps_contents() {
        let mut buffer = TelemetryBuffer::new(2).unwrap();
        buffer.push(sample("a"));
        buffer.push(sample("b"));
        buffer.set_capacity(3).unwrap();
        buffer.push(sample("c"));
        assert_eq!(raws(&buffer), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_clear() {
        let mut buffer = TelemetryBuffer::new(3).unwrap();
        buffer.push(sample("a"));
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.latest().is_none());
    }

    #[test]
    fn test_stats_skip_non_numeric() {
        let mut buffer = TelemetryBuffer::new(10).unwrap();
        for raw in ["10", "OK", "30", "20"] {
            buffer.push(sample(raw));
        }
        let stats = buffer.stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.numeric_count, 3);
        assert_eq!(stats.latest, Some(20.0));
        assert_eq!(stats.min, Some(10.0));
        assert_eq!(stats.max, Some(30.0));
        assert_eq!(stats.mean, Some(20.0));
    }

    #[test]
    fn test_stats_empty() {
        let buffer = TelemetryBuffer::new(1).unwrap();
        assert_eq!(buffer.stats(), TelemetryStats::default());
    }
}
