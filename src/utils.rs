use std::net::IpAddr;

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Placeholder for values that are not set
pub const EMPTY_VALUE: &str = "---";

/// Split a u32 into its high and low 16 bits if it exceeds the 2-byte limit
/// E.g. (4259840100, ':') -> "65000:100"
pub fn u32_to_dotted(value: u32, sep: char) -> String {
    if value < u32::from(std::u16::MAX) {
        format!("{}", value)
    } else {
        format!("{}{}{}", value >> 16, sep, value & 0xffff)
    }
}

/// Convert an ASN (4 byte) as dotted if it exceeds the 2-byte limit
/// E.g. 4259840100 -> "65000.100"
pub fn asn_to_dotted(asn: u32) -> String {
    u32_to_dotted(asn, '.')
}

/// Convert the first 16 bytes (1 IPv6 address) to IpAddr
pub fn bytes_to_ipv6(bytes: &[u8]) -> Option<IpAddr> {
    if bytes.len() < 16 {
        return None;
    }
    let mut buffer: [u8; 16] = [0; 16];
    buffer.clone_from_slice(&bytes[..16]);
    Some(IpAddr::from(buffer))
}

fn fit_with_remainder(dividend: u64, divisor: u64) -> (u64, u64) {
    let fit = dividend / divisor;
    let remainder = dividend % divisor;
    (fit, remainder)
}

pub fn get_elapsed_time<Tz>(time: DateTime<Tz>) -> Duration
where
    Tz: TimeZone,
{
    Utc::now().signed_duration_since(time)
}

/// Given a duration, format like "00:00:00"
pub fn format_elapsed_time(elapsed: Duration) -> String {
    let elapsed = elapsed.num_seconds().abs() as u64;
    let (hours, remainder) = fit_with_remainder(elapsed, 3600);
    let (minutes, seconds) = fit_with_remainder(remainder, 60);
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Given a timestamp, get the elapsed time and return formatted string
pub fn format_time_as_elapsed<Tz>(time: DateTime<Tz>) -> String
where
    Tz: TimeZone,
{
    format_elapsed_time(get_elapsed_time(time))
}

pub fn maybe_string<T>(item: Option<&T>) -> String
where
    T: ToString,
{
    item.map(std::string::ToString::to_string)
        .unwrap_or_else(|| String::from(EMPTY_VALUE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asn_to_dotted() {
        assert_eq!(asn_to_dotted(100), "100".to_string());
        assert_eq!(asn_to_dotted(4259840100), "65000.100".to_string());
        assert_eq!(u32_to_dotted(4259840100, ':'), "65000:100".to_string());
    }

    #[test]
    fn test_bytes_to_ipv6() {
        let mut bytes = vec![0u8; 16];
        bytes[0] = 0x20;
        bytes[1] = 0x01;
        bytes[15] = 0x01;
        assert_eq!(bytes_to_ipv6(&bytes), Some("2001::1".parse().unwrap()));
        assert_eq!(bytes_to_ipv6(&bytes[..4]), None);
    }

    #[test]
    fn test_format_elapsed_time() {
        assert_eq!(
            format_elapsed_time(Duration::seconds(30)),
            "00:00:30".to_string()
        );
        assert_eq!(
            format_elapsed_time(Duration::seconds(301)),
            "00:05:01".to_string()
        );
        assert_eq!(
            format_elapsed_time(Duration::seconds(32768)),
            "09:06:08".to_string()
        );
    }

    #[test]
    fn test_format_time_as_elapsed() {
        let then = Utc::now() - Duration::seconds(61);
        assert_eq!(format_time_as_elapsed(then), "00:01:01".to_string());
    }

    #[test]
    fn test_maybe_string() {
        let value: Option<u64> = Some(5);
        assert_eq!(maybe_string(value.as_ref()), String::from("5"));
        let value: Option<&str> = Some("test");
        assert_eq!(maybe_string(value.as_ref()), String::from("test"));
        let value: Option<&str> = None;
        assert_eq!(maybe_string(value.as_ref()), String::from("---"));
    }
}
