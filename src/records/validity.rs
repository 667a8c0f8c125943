//! Validity checks applied to configuration values before they are stored.

use regex::Regex;

use super::CheckType;

/// Returns whether `value` passes a check of `check_type` against `expr`.
///
/// An unusable expression (invalid regex, malformed range) fails the check.
#[must_use]
pub fn check(check_type: CheckType, expr: &str, value: &str) -> bool {
    match check_type {
        CheckType::Null => true,
        CheckType::Str => regex_check(expr, value),
        CheckType::Int => range_check(expr, value),
        CheckType::Ip => ip_check(expr, value),
    }
}

/// `value` contains a match of the regular expression `pattern`.
#[must_use]
pub fn regex_check(pattern: &str, value: &str) -> bool {
    Regex::new(pattern).is_ok_and(|re| re.is_match(value))
}

/// `value` is a decimal integer inside the inclusive `[lo-hi]` range.
///
/// Anything before the opening bracket is ignored.
#[must_use]
pub fn range_check(range: &str, value: &str) -> bool {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let (Some((lo, hi)), Ok(value)) = (parse_range(range), value.parse::<u64>()) else {
        return false;
    };
    (lo..=hi).contains(&value)
}

fn parse_range(range: &str) -> Option<(u64, u64)> {
    let (_, rest) = range.split_once('[')?;
    let body = rest.split(']').next()?;
    let (lo, hi) = body.split_once('-')?;
    Some((lo.trim().parse().ok()?, hi.trim().parse().ok()?))
}

/// `value` is a dotted quad whose octets fall inside the four ranges of
/// `pattern` (`[lo-hi]\.[lo-hi]\.[lo-hi]\.[lo-hi]`), or is empty.
#[must_use]
pub fn ip_check(pattern: &str, value: &str) -> bool {
    if value.is_empty() {
        return true;
    }

    let ranges: Vec<&str> = pattern.split("\\.").collect();
    let octets: Vec<&str> = value.split('.').collect();
    if ranges.len() != 4 || octets.len() != 4 {
        return false;
    }
    ranges
        .iter()
        .zip(&octets)
        .all(|(range, octet)| octet.len() <= 3 && range_check(range, octet))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_check_accepts_anything() {
        assert!(check(CheckType::Null, "", "whatever"));
    }

    #[test]
    fn regex() {
        assert!(check(CheckType::Str, "^[a-z]+$", "abc"));
        assert!(!check(CheckType::Str, "^[a-z]+$", "ab1"));
        assert!(!check(CheckType::Str, "(", "anything"));
    }

    #[test]
    fn range() {
        assert!(check(CheckType::Int, "[0-1]", "0"));
        assert!(check(CheckType::Int, "[0-1]", "1"));
        assert!(!check(CheckType::Int, "[0-1]", "2"));
        assert!(!check(CheckType::Int, "[0-1]", "-1"));
        assert!(!check(CheckType::Int, "[0-1]", ""));
        assert!(!check(CheckType::Int, "not a range", "1"));
        assert!(check(CheckType::Int, "[1-65535]", "8080"));
    }

    #[test]
    fn ip() {
        let pattern = r"[0-255]\.[0-255]\.[0-255]\.[0-255]";
        assert!(check(CheckType::Ip, pattern, "127.0.0.1"));
        assert!(check(CheckType::Ip, pattern, ""));
        assert!(!check(CheckType::Ip, pattern, "256.0.0.1"));
        assert!(!check(CheckType::Ip, pattern, "10.0.1"));

        let private = r"[10-10]\.[0-255]\.[0-255]\.[0-255]";
        assert!(check(CheckType::Ip, private, "10.1.2.3"));
        assert!(!check(CheckType::Ip, private, "192.168.0.1"));
    }
}
