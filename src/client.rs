//! Request header access and client identification.

use std::collections::{BTreeMap, HashMap};

/// Identifier shared by every client whose address could not be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Longest accepted client address.
const MAX_CLIENT_ID_LEN: usize = 64;

/// Headers consulted for the client address, most trusted first: edge proxy,
/// reverse proxy, forwarded-for chain, CDN.
pub const CLIENT_IP_HEADERS: [&str; 4] = [
    "cf-connecting-ip",
    "x-real-ip",
    "x-forwarded-for",
    "true-client-ip",
];

/// Case-insensitive header lookup over whatever map the host framework
/// hands us.
pub trait HeaderLookup {
    fn header(&self, name: &str) -> Option<&str>;
}

impl HeaderLookup for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl HeaderLookup for BTreeMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl HeaderLookup for [(&str, &str)] {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| *value)
    }
}

impl<const N: usize> HeaderLookup for [(&str, &str); N] {
    fn header(&self, name: &str) -> Option<&str> {
        self.as_slice().header(name)
    }
}

fn normalized_address(raw: &str) -> Option<String> {
    let candidate = raw.trim();
    if candidate.is_empty() || candidate.len() > MAX_CLIENT_ID_LEN {
        return None;
    }
    if candidate
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b':' || b == b'-')
    {
        Some(candidate.to_string())
    } else {
        None
    }
}

/// Best-effort client identifier for rate limiting and like records.
///
/// Without a trusted reverse proxy setting these headers, every direct
/// client shares the [`UNKNOWN_CLIENT`] bucket.
pub fn client_identifier<H: HeaderLookup + ?Sized>(headers: &H) -> String {
    for name in CLIENT_IP_HEADERS {
        let Some(raw) = headers.header(name) else {
            continue;
        };
        let raw = if name == "x-forwarded-for" {
            raw.split(',').next().unwrap_or_default()
        } else {
            raw
        };
        if let Some(address) = normalized_address(raw) {
            return address;
        }
    }

    tracing::debug!("could not determine client address; using fallback bucket");
    UNKNOWN_CLIENT.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_proxy_header_wins() {
        let headers = [
            ("X-Forwarded-For", "10.0.0.1, 10.0.0.2"),
            ("X-Real-IP", "10.0.0.3"),
            ("CF-Connecting-IP", " 203.0.113.7 "),
        ];
        assert_eq!(client_identifier(&headers), "203.0.113.7");
    }

    #[test]
    fn real_ip_beats_forwarded_for() {
        let headers = [("x-forwarded-for", "10.0.0.1"), ("x-real-ip", "10.0.0.3")];
        assert_eq!(client_identifier(&headers), "10.0.0.3");
    }

    #[test]
    fn forwarded_for_uses_first_hop() {
        let headers = [("x-forwarded-for", "2001:db8::1 , 10.0.0.2")];
        assert_eq!(client_identifier(&headers), "2001:db8::1");
    }

    #[test]
    fn cdn_header_is_last_resort() {
        let mut headers = HashMap::new();
        headers.insert("True-Client-IP".to_string(), "198.51.100.4".to_string());
        assert_eq!(client_identifier(&headers), "198.51.100.4");
    }

    #[test]
    fn malformed_values_are_skipped() {
        let headers = [
            ("cf-connecting-ip", "<script>"),
            ("x-real-ip", ""),
            ("x-forwarded-for", "198.51.100.9"),
        ];
        assert_eq!(client_identifier(&headers), "198.51.100.9");

        let oversized = "1".repeat(65);
        let headers = [("x-real-ip", oversized.as_str())];
        assert_eq!(client_identifier(&headers), UNKNOWN_CLIENT);
    }

    #[test]
    fn no_headers_falls_back_to_unknown() {
        let headers: BTreeMap<String, String> = BTreeMap::new();
        assert_eq!(client_identifier(&headers), UNKNOWN_CLIENT);
    }
}
