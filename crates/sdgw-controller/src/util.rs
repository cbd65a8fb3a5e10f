//! Small parsing helpers shared across subsystems.

use std::net::Ipv4Addr;

/// Errors from [`parse_ip_range`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IpRangeError {
    #[error("invalid IP range format: {0}")]
    Format(String),

    #[error("not a valid IPv4 address: {0}")]
    Address(String),
}

/// Parse an address pool of the form "192.168.3.100-192.168.3.200".
pub fn parse_ip_range(range: &str) -> Result<(Ipv4Addr, Ipv4Addr), IpRangeError> {
    let (start, end) = range
        .trim()
        .split_once('-')
        .ok_or_else(|| IpRangeError::Format(range.to_string()))?;

    let start = start
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| IpRangeError::Address(start.trim().to_string()))?;
    let end = end
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| IpRangeError::Address(end.trim().to_string()))?;

    Ok((start, end))
}

/// Seconds since the unix epoch.
pub fn unix_now() -> i64 {
    #[allow(clippy::cast_possible_wrap)]
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    secs
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_range() {
        let (start, end) = parse_ip_range("192.168.3.100-192.168.3.200").unwrap();
        assert_eq!(start, Ipv4Addr::new(192, 168, 3, 100));
        assert_eq!(end, Ipv4Addr::new(192, 168, 3, 200));
    }

    #[test]
    fn parse_range_with_whitespace() {
        let (start, end) = parse_ip_range("  10.0.0.1 - 10.0.0.9  ").unwrap();
        assert_eq!(start, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(end, Ipv4Addr::new(10, 0, 0, 9));
    }

    #[test]
    fn parse_range_missing_separator() {
        assert_eq!(
            parse_ip_range("192.168.3.100"),
            Err(IpRangeError::Format("192.168.3.100".to_string()))
        );
    }

    #[test]
    fn parse_range_bad_address() {
        assert!(matches!(
            parse_ip_range("not-an-ip-10.0.0.1"),
            Err(IpRangeError::Address(_))
        ));
        assert!(matches!(
            parse_ip_range("10.0.0.1-nope"),
            Err(IpRangeError::Address(_))
        ));
    }

    #[test]
    fn ip_arithmetic_matches_lease_math() {
        let (start, end) = parse_ip_range("192.168.3.100-192.168.3.200").unwrap();
        assert_eq!(u32::from(end) - u32::from(start) + 1, 101);
    }

    #[test]
    fn unix_now_is_reasonable() {
        // After 2020.
        assert!(unix_now() > 1_577_836_800);
    }
}
