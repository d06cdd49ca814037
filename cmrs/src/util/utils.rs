//! Utility functions for property names and log-friendly summaries.
//!
//! ConnMan uses upper-camel property names on the wire (`Powered`,
//! `AutoConnect`, `IPv4`); this crate exposes lower-camel names
//! (`powered`, `autoConnect`, `iPv4`).

use std::fmt::Write;

use crate::api::models::{ServiceState, Services};
use crate::types::constants::state_shorthand;

/// Lower-cases the first character of `s`.
pub(crate) fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Upper-cases the first character of `s`.
pub(crate) fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Converts a service state to its one-character shorthand.
pub(crate) fn state_shorthand(state: &ServiceState) -> char {
    match state {
        ServiceState::Online => state_shorthand::ONLINE,
        ServiceState::Ready => state_shorthand::READY,
        ServiceState::Association => state_shorthand::ASSOCIATION,
        ServiceState::Configuration => state_shorthand::CONFIGURATION,
        ServiceState::Disconnect => state_shorthand::DISCONNECT,
        ServiceState::Idle => state_shorthand::IDLE,
        ServiceState::Failure => state_shorthand::FAILURE,
        ServiceState::Unknown(_) => state_shorthand::UNKNOWN,
    }
}

/// Renders a network list for debug logs, one line per service:
///
/// ```text
/// *AR 'home' [psk]
///    'cafe' [none]
/// ```
///
/// The columns are favorite (`*`), auto-connect (`A`), and the state
/// shorthand.
pub(crate) fn services_summary(services: &Services) -> String {
    let mut out = String::from("\n");
    for (_, service) in services {
        let _ = writeln!(
            out,
            "{}{}{} '{}' [{}]",
            if service.favorite { '*' } else { ' ' },
            if service.auto_connect { 'A' } else { ' ' },
            state_shorthand(&service.state),
            service.ssid,
            service.security.join(", ")
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::ServiceRecord;

    #[test]
    fn test_lower_first() {
        assert_eq!(lower_first("Powered"), "powered");
        assert_eq!(lower_first("AutoConnect"), "autoConnect");
        assert_eq!(lower_first("IPv4"), "iPv4");
        assert_eq!(lower_first("state"), "state");
        assert_eq!(lower_first(""), "");
    }

    #[test]
    fn test_upper_first() {
        assert_eq!(upper_first("powered"), "Powered");
        assert_eq!(upper_first("tetheringIdentifier"), "TetheringIdentifier");
        assert_eq!(upper_first("Tethering"), "Tethering");
        assert_eq!(upper_first(""), "");
    }

    #[test]
    fn test_state_shorthand() {
        assert_eq!(state_shorthand(&ServiceState::Online), 'O');
        assert_eq!(state_shorthand(&ServiceState::Ready), 'R');
        assert_eq!(state_shorthand(&ServiceState::Idle), ' ');
        assert_eq!(state_shorthand(&ServiceState::Failure), 'x');
        assert_eq!(state_shorthand(&ServiceState::Unknown("x".into())), '?');
    }

    #[test]
    fn test_services_summary() {
        let services = vec![
            (
                "wifi_home".to_string(),
                ServiceRecord {
                    ssid: "home".into(),
                    state: ServiceState::Ready,
                    security: vec!["psk".into()],
                    favorite: true,
                    auto_connect: true,
                    ..Default::default()
                },
            ),
            (
                "wifi_cafe".to_string(),
                ServiceRecord {
                    ssid: "cafe".into(),
                    security: vec!["none".into()],
                    ..Default::default()
                },
            ),
        ];

        assert_eq!(
            services_summary(&services),
            "\n*AR 'home' [psk]\n    'cafe' [none]\n"
        );
    }
}
