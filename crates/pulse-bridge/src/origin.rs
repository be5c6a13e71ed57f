//! Browser origin checks for the CORS layer.
//!
//! Local origins match on scheme and host exactly, with an optional numeric
//! port. Configured origins must match verbatim.

/// Loopback origins accepted on any port.
pub const LOCAL_ORIGINS: &[&str] = &[
    "http://localhost",
    "https://localhost",
    "http://127.0.0.1",
    "https://127.0.0.1",
];

/// `origin` is `base` or `base:<port>`.
fn matches_with_port(origin: &str, base: &str) -> bool {
    match origin.strip_prefix(base) {
        Some("") => true,
        Some(rest) => rest
            .strip_prefix(':')
            .is_some_and(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit())),
        None => false,
    }
}

pub fn is_allowed_origin(origin: &str, configured: &[String]) -> bool {
    LOCAL_ORIGINS
        .iter()
        .any(|base| matches_with_port(origin, base))
        || configured.iter().any(|allowed| origin == allowed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_origins_with_and_without_port() {
        assert!(is_allowed_origin("http://localhost", &[]));
        assert!(is_allowed_origin("http://localhost:5173", &[]));
        assert!(is_allowed_origin("https://127.0.0.1:8443", &[]));
    }

    #[test]
    fn lookalike_hosts_are_rejected() {
        for origin in [
            "http://localhost.attacker.example",
            "http://localhost:5173.attacker.example",
            "http://127.0.0.1.nip.io",
            "http://localhost@attacker.example",
            "http://localhost:",
            "http://localhostevil",
        ] {
            assert!(!is_allowed_origin(origin, &[]), "{origin} should be rejected");
        }
    }

    #[test]
    fn configured_origins_match_exactly() {
        let configured = vec!["https://dash.example.com".to_string()];
        assert!(is_allowed_origin("https://dash.example.com", &configured));
        assert!(!is_allowed_origin("https://dash.example.com.evil", &configured));
        assert!(!is_allowed_origin("https://dash.example.com:444", &configured));
    }
}
