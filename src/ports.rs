use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Lowest and highest port of the default sweep.
pub const DEFAULT_FIRST_PORT: u16 = 1;
pub const DEFAULT_LAST_PORT: u16 = 1024;

/// Inclusive range of TCP ports to sweep (1..=65535).
///
/// Accepted text forms:
/// - single port number: `80`
/// - inclusive range: `1-1024`
/// - surrounding whitespace is ignored
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub struct PortRange {
    first: u16,
    last: u16,
}

impl PortRange {
    pub fn new(first: u16, last: u16) -> Result<Self, ScanError> {
        if first == 0 {
            return Err(ScanError::InvalidPortRange("port 0 is not scannable".into()));
        }
        if first > last {
            return Err(ScanError::InvalidPortRange(format!(
                "{first}-{last} (start > end)"
            )));
        }
        Ok(Self { first, last })
    }

    pub fn first(&self) -> u16 {
        self.first
    }

    pub fn last(&self) -> u16 {
        self.last
    }

    pub fn len(&self) -> usize {
        usize::from(self.last - self.first) + 1
    }

    /// Never true: a range always holds at least one port.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Ports in ascending order.
    pub fn iter(&self) -> RangeInclusive<u16> {
        self.first..=self.last
    }

    pub fn contains(&self, port: u16) -> bool {
        self.iter().contains(&port)
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            first: DEFAULT_FIRST_PORT,
            last: DEFAULT_LAST_PORT,
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}-{}", self.first, self.last)
        }
    }
}

impl FromStr for PortRange {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((a, b)) = s.split_once('-') {
            let first = parse_port_str(a.trim())?;
            let last = parse_port_str(b.trim())?;
            return Self::new(first, last);
        }
        let port = parse_port_str(s)?;
        Self::new(port, port)
    }
}

impl TryFrom<String> for PortRange {
    type Error = ScanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PortRange> for String {
    fn from(range: PortRange) -> Self {
        range.to_string()
    }
}

fn parse_port_str(s: &str) -> Result<u16, ScanError> {
    let val: u32 = s
        .parse::<u32>()
        .map_err(|e| ScanError::InvalidPortRange(format!("{s:?}: {e}")))?;
    if val == 0 || val > 65535 {
        return Err(ScanError::InvalidPortRange(format!("port out of range: {val}")));
    }
    Ok(val as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_first_1024() {
        let r = PortRange::default();
        assert_eq!((r.first(), r.last()), (1, 1024));
        assert_eq!(r.len(), 1024);
        assert_eq!(r.to_string(), "1-1024");
    }

    #[test]
    fn parse_single_and_range() {
        let single: PortRange = " 22 ".parse().unwrap();
        assert_eq!(single.iter().collect::<Vec<_>>(), vec![22]);
        assert_eq!(single.to_string(), "22");

        let range: PortRange = "8000 - 8002".parse().unwrap();
        assert_eq!(range.iter().collect::<Vec<_>>(), vec![8000, 8001, 8002]);
        assert!(range.contains(8001));
        assert!(!range.contains(8003));
    }

    #[test]
    fn full_range_len_does_not_overflow() {
        let r: PortRange = "1-65535".parse().unwrap();
        assert_eq!(r.len(), 65535);
    }

    #[test]
    fn invalid_values_error() {
        assert!("0".parse::<PortRange>().is_err());
        assert!("70000".parse::<PortRange>().is_err());
        assert!("100-10".parse::<PortRange>().is_err());
        assert!("http".parse::<PortRange>().is_err());
        assert!(PortRange::new(0, 10).is_err());
    }

    #[test]
    fn serde_uses_text_form() {
        let r: PortRange = serde_json::from_str("\"20-25\"").unwrap();
        assert_eq!(r, PortRange::new(20, 25).unwrap());
        assert_eq!(serde_json::to_string(&r).unwrap(), "\"20-25\"");
    }
}
