//! Sample event payloads.

/// Minimal sequenced event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ping {
    /// Sequence number.
    pub seq: u64,
}

impl Ping {
    /// Create a ping with the given sequence number.
    #[must_use]
    pub fn new(seq: u64) -> Self {
        Self { seq }
    }
}

/// Sensor reading, the typical "latest value" sticky event.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Sensor name.
    pub sensor: String,
    /// Measured value.
    pub value: f64,
}

impl Reading {
    /// Create a reading.
    #[must_use]
    pub fn new(sensor: impl Into<String>, value: f64) -> Self {
        Self {
            sensor: sensor.into(),
            value,
        }
    }
}

/// Free-text notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice(pub String);

impl Notice {
    /// Create a notice.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

/// `count` pings numbered from `start`.
#[must_use]
pub fn pings(start: u64, count: u64) -> Vec<Ping> {
    (start..start.saturating_add(count)).map(Ping::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pings_range() {
        let seqs: Vec<u64> = pings(3, 4).iter().map(|p| p.seq).collect();
        assert_eq!(seqs, vec![3, 4, 5, 6]);
        assert!(pings(0, 0).is_empty());
    }

    #[test]
    fn test_constructors() {
        assert_eq!(Reading::new("t1", 2.5).sensor, "t1");
        assert_eq!(Notice::new("hi"), Notice("hi".to_string()));
    }
}
