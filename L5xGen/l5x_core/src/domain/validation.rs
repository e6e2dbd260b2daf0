//! Rockwell attribute grammars shared by every typed object.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{L5xError, L5xResult};

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid regex"));
static REVISION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)*$").expect("valid regex"));

/// Rockwell identifier: letters, digits and underscores only.
pub fn is_valid_string(text: &str) -> bool {
    NAME_RE.is_match(text)
}

/// Numeric-dot revision, e.g. `1.2.3` or `33.01`.
pub fn is_valid_revision_string(text: &str) -> bool {
    REVISION_RE.is_match(text)
}

pub fn is_valid_rockwell_bool(text: &str) -> bool {
    text == "true" || text == "false"
}

pub fn rockwell_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Attribute read side: anything other than `true` (any case) is false.
pub fn parse_rockwell_bool(text: Option<&str>) -> bool {
    text.map(|t| t.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn validate_name(field: &str, name: &str) -> L5xResult<()> {
    if !is_valid_string(name) {
        return Err(L5xError::validation(
            field,
            format!("'{}' is not a valid Rockwell name", name),
        ));
    }
    Ok(())
}

pub fn validate_revision(field: &str, revision: &str) -> L5xResult<()> {
    if !is_valid_revision_string(revision) {
        return Err(L5xError::validation(
            field,
            format!("'{}' is not a valid revision string", revision),
        ));
    }
    Ok(())
}

pub fn validate_rockwell_bool(field: &str, text: &str) -> L5xResult<()> {
    if !is_valid_rockwell_bool(text) {
        return Err(L5xError::validation(
            field,
            format!("'{}' is not a valid Rockwell bool", text),
        ));
    }
    Ok(())
}

pub fn validate_one_of(field: &str, value: &str, allowed: &[&str]) -> L5xResult<()> {
    if !allowed.contains(&value) {
        return Err(L5xError::validation(
            field,
            format!("'{}' must be one of {:?}", value, allowed),
        ));
    }
    Ok(())
}

/// Integer-valued attribute such as `@Vendor` or `@Major`.
pub fn validate_integer(field: &str, value: &str) -> L5xResult<i64> {
    value.trim().parse::<i64>().map_err(|_| {
        L5xError::validation(field, format!("'{}' is not an integer", value))
    })
}

/// IPv4 address: exactly four dot-separated octets, each in 0..=255.
pub fn validate_ip_address(address: &str) -> L5xResult<()> {
    let octets: Vec<&str> = address.split('.').collect();
    if octets.len() != 4 {
        return Err(L5xError::validation(
            "ip address",
            format!("'{}' must have 4 octets", address),
        ));
    }
    for octet in octets {
        let ok = !octet.is_empty()
            && octet.chars().all(|c| c.is_ascii_digit())
            && octet.parse::<u16>().map(|v| v <= 255).unwrap_or(false);
        if !ok {
            return Err(L5xError::validation(
                "ip address",
                format!("octet '{}' out of range in '{}'", octet, address),
            ));
        }
    }
    Ok(())
}

/// Escapes the XML-significant characters of a value as stored in the tree.
pub fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rockwell_names() {
        assert!(is_valid_string("ValidName"));
        assert!(is_valid_string("Tag_01"));
        assert!(!is_valid_string("Invalid Name!"));
        assert!(!is_valid_string(""));
    }

    #[test]
    fn revision_grammar() {
        assert!(is_valid_revision_string("1.2.3"));
        assert!(is_valid_revision_string("33"));
        assert!(!is_valid_revision_string("1..2"));
        assert!(!is_valid_revision_string("v1.0"));
    }

    #[test]
    fn rockwell_bool_strings() {
        assert!(is_valid_rockwell_bool("true"));
        assert!(is_valid_rockwell_bool("false"));
        assert!(!is_valid_rockwell_bool("yes"));
        assert!(parse_rockwell_bool(Some("TRUE")));
        assert!(!parse_rockwell_bool(None));
    }

    #[test]
    fn ip_address_octets() {
        struct Case {
            address: &'static str,
            ok: bool,
        }
        let cases = vec![
            Case { address: "192.168.1.10", ok: true },
            Case { address: "0.0.0.0", ok: true },
            Case { address: "255.255.255.255", ok: true },
            Case { address: "256.1.1.1", ok: false },
            Case { address: "10.0.0", ok: false },
            Case { address: "10.0.0.1.5", ok: false },
            Case { address: "10.a.0.1", ok: false },
            Case { address: "10..0.1", ok: false },
        ];
        for case in cases {
            assert_eq!(
                validate_ip_address(case.address).is_ok(),
                case.ok,
                "address {}",
                case.address
            );
        }
    }

    #[test]
    fn escape_markup_escapes_ampersand_first() {
        assert_eq!(escape_markup("a<b & c>d"), "a&lt;b &amp; c&gt;d");
    }
}
