//! Normalization of raw ConnMan attribute maps.
//!
//! Pure, synchronous transforms. Missing or mistyped attributes fall back
//! to empty defaults; nothing here fails.

use crate::api::models::{PropertyMap, PropertyValue, ServiceRecord, ServiceState, Services};
use crate::types::constants::HIDDEN_SSID;
use crate::util::utils::lower_first;

/// Lower-cases the first letter of every key. Values are not touched.
pub(crate) fn parse_properties(raw: &PropertyMap) -> PropertyMap {
    raw.iter()
        .map(|(key, value)| (lower_first(key), value.clone()))
        .collect()
}

/// Builds a [`ServiceRecord`] from a raw service attribute map.
///
/// Only `state`, `strength`, `security`, `favorite`, `immutable` and
/// `autoConnect` are read; `ssid` comes from `name` and `ipaddress` from
/// the `IPv4`/`IPv6` sub-maps. The IPv4 address wins when both are set.
pub(crate) fn parse_service(raw: &PropertyMap) -> ServiceRecord {
    let props = parse_properties(raw);

    let state = props
        .get("state")
        .and_then(PropertyValue::as_str)
        .map(ServiceState::from)
        .unwrap_or_default();
    let strength = props
        .get("strength")
        .and_then(PropertyValue::as_i64)
        .map(|s| s.clamp(0, 100) as u8)
        .unwrap_or(0);
    let security = props
        .get("security")
        .map(PropertyValue::to_string_list)
        .unwrap_or_default();
    let flag = |key: &str| props.get(key).and_then(PropertyValue::as_bool).unwrap_or(false);

    let ssid = match props.get("name").and_then(PropertyValue::as_str) {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => HIDDEN_SSID.to_owned(),
    };

    ServiceRecord {
        ssid,
        state,
        strength,
        security,
        favorite: flag("favorite"),
        immutable: flag("immutable"),
        auto_connect: flag("autoConnect"),
        ipaddress: ip_address(&props),
    }
}

/// Applies [`parse_service`] to every entry, keeping ids and order.
pub(crate) fn parse_services(raw: &[(String, PropertyMap)]) -> Services {
    raw.iter()
        .map(|(id, props)| (id.clone(), parse_service(props)))
        .collect()
}

/// Returns the `Address` of an `IPv4`/`IPv6` sub-map, if non-empty.
pub(crate) fn address_of(value: &PropertyValue) -> Option<String> {
    let map = parse_properties(value.as_map()?);
    map.get("address")
        .and_then(PropertyValue::as_str)
        .filter(|a| !a.is_empty())
        .map(str::to_owned)
}

/// First non-empty address, IPv4 before IPv6.
pub(crate) fn ip_address(props: &PropertyMap) -> String {
    props
        .get("iPv4")
        .and_then(address_of)
        .or_else(|| props.get("iPv6").and_then(address_of))
        .unwrap_or_default()
}
