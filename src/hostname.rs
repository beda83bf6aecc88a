/// Longest hostname accepted, in bytes.
pub const MAX_HOSTNAME_LEN: usize = 253;

/// Strip an optional `:port` from a raw `Host` header value.
///
/// Everything from the first `:` on is dropped, so bracketed IPv6 literals
/// with a port keep only the part before their first colon.
pub fn strip_port(raw_host: &str) -> &str {
    raw_host.split(':').next().unwrap_or(raw_host)
}

/// Check an untrusted hostname against the injection policy.
///
/// Sinkholed names can be anything a resolver was pointed at, so syntax is
/// not checked: `localhost`, private IPs, brackets and colons all pass.
/// Only empty or oversized values, control bytes, and the characters that
/// matter for HTML or header injection are rejected.
pub fn is_valid_hostname(candidate: &str) -> bool {
    if candidate.is_empty() || candidate.len() > MAX_HOSTNAME_LEN {
        return false;
    }
    !candidate.bytes().any(is_forbidden_byte)
}

fn is_forbidden_byte(byte: u8) -> bool {
    // CR and LF fall inside the control range.
    matches!(byte, 0x00..=0x1F | 0x7F | b'<' | b'>' | b'\'' | b'"' | b'\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_sinkholed_names() {
        for host in [
            "localhost",
            "10.0.0.5",
            "[::1]",
            "evil-domain.example",
            "xn--80ak6aa92e.com",
            "under_score.example",
        ] {
            assert!(is_valid_hostname(host), "{host} should pass");
        }
    }

    #[test]
    fn rejects_injection_characters() {
        for host in [
            "a\r\nInjected: 1",
            "evil\r.example",
            "evil\n.example",
            "<script>",
            "evil>.example",
            "it's.example",
            "\"quoted\".example",
            "back\\slash.example",
            "tab\there.example",
            "nul\0.example",
            "del\x7f.example",
        ] {
            assert!(!is_valid_hostname(host), "{host:?} should be rejected");
        }
    }

    #[test]
    fn enforces_length_bounds() {
        assert!(!is_valid_hostname(""));
        assert!(is_valid_hostname(&"a".repeat(MAX_HOSTNAME_LEN)));
        assert!(!is_valid_hostname(&"a".repeat(MAX_HOSTNAME_LEN + 1)));
    }

    #[test]
    fn length_is_counted_in_bytes() {
        // 127 two-byte characters = 254 bytes
        let host = "é".repeat(127);
        assert!(!is_valid_hostname(&host));
    }

    #[test]
    fn strips_port_at_first_colon() {
        assert_eq!(strip_port("evil.example:8080"), "evil.example");
        assert_eq!(strip_port("evil.example"), "evil.example");
        assert_eq!(strip_port("[::1]:443"), "[");
        assert_eq!(strip_port(":80"), "");
    }
}
