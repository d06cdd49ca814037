//! Event publishing of the Wi-Fi adapter's local ConnMan state.

mod common;

use std::sync::Arc;

use cmrs::{Event, PropertyValue, ServiceState, TechnologyKind};
use common::{
    Fake, MemoryStore, connection_changes, connman, drain, ipv4, settle, wifi_service,
};

fn setup() -> (Fake, Arc<MemoryStore>) {
    let fake = Fake::new();
    fake.add_service("wifi_home", wifi_service("home", "ready", &["psk"], true));
    fake.add_service("wifi_cafe", wifi_service("cafe", "idle", &["none"], false));
    (fake, Arc::new(MemoryStore::default()))
}

#[tokio::test(start_paused = true)]
async fn test_initial_state_is_replayed() {
    let (fake, store) = setup();
    let connman = connman(&fake, &store).await;
    let wifi = connman.wifi().await.unwrap();

    let mut rx = wifi.subscribe();
    settle().await;
    let events = drain(&mut rx);

    assert!(events.contains(&Event::PropertyChanged {
        name: "powered".into(),
        value: true.into(),
    }));
    assert!(events.contains(&Event::ServiceChanged(Some("wifi_home".into()))));

    let fields = connection_changes(&events);
    assert!(fields.contains(&("ssid".into(), "home".into())));
    assert!(fields.contains(&("state".into(), "ready".into())));
    assert_eq!(fields.len(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_initial_state_is_replayed_after_powering_radio() {
    let (fake, store) = setup();
    fake.add_technology(TechnologyKind::Wifi, false, false);
    let connman = connman(&fake, &store).await;
    let wifi = connman.wifi().await.unwrap();

    // init slept through the settle delay before returning
    let mut rx = wifi.subscribe();
    settle().await;
    let events = drain(&mut rx);

    assert!(events.contains(&Event::ServiceChanged(Some("wifi_home".into()))));
    assert!(events.contains(&Event::PropertyChanged {
        name: "powered".into(),
        value: true.into(),
    }));
    assert!(connection_changes(&events).contains(&("ssid".into(), "home".into())));
}

#[tokio::test(start_paused = true)]
async fn test_replay_goes_to_first_subscriber_only() {
    let (fake, store) = setup();
    let connman = connman(&fake, &store).await;
    let wifi = connman.wifi().await.unwrap();
    settle().await;

    let mut first = wifi.subscribe();
    settle().await;
    assert!(!drain(&mut first).is_empty());

    let mut second = wifi.subscribe();
    settle().await;
    assert!(drain(&mut second).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_repeated_values_are_not_published() {
    let (fake, store) = setup();
    let connman = connman(&fake, &store).await;
    let wifi = connman.wifi().await.unwrap();
    let mut rx = wifi.subscribe();
    // Discard the initial replay
    settle().await;
    drain(&mut rx);

    fake.emit_service_property("wifi_home", "Strength", PropertyValue::Int(60));
    fake.emit_technology_property(TechnologyKind::Wifi, "Powered", true.into());
    settle().await;
    assert!(drain(&mut rx).is_empty());

    fake.emit_service_property("wifi_home", "Strength", PropertyValue::Int(75));
    fake.emit_service_property("wifi_home", "Strength", PropertyValue::Int(75));
    settle().await;
    assert_eq!(
        connection_changes(&drain(&mut rx)),
        vec![("strength".to_string(), PropertyValue::Int(75))]
    );
    assert_eq!(wifi.connection_properties().strength, 75);
}

#[tokio::test(start_paused = true)]
async fn test_name_change_also_publishes_ssid() {
    let (fake, store) = setup();
    let connman = connman(&fake, &store).await;
    let wifi = connman.wifi().await.unwrap();
    let mut rx = wifi.subscribe();
    settle().await;
    drain(&mut rx);

    fake.emit_service_property("wifi_home", "Name", "home-5g".into());
    settle().await;

    assert_eq!(
        connection_changes(&drain(&mut rx)),
        vec![
            ("name".to_string(), PropertyValue::from("home-5g")),
            ("ssid".to_string(), PropertyValue::from("home-5g")),
        ]
    );
    assert_eq!(wifi.connection_properties().ssid, "home-5g");
}

#[tokio::test(start_paused = true)]
async fn test_service_error_is_not_published() {
    let (fake, store) = setup();
    let connman = connman(&fake, &store).await;
    let wifi = connman.wifi().await.unwrap();
    let mut rx = wifi.subscribe();
    settle().await;
    drain(&mut rx);

    fake.emit_service_property("wifi_home", "Error", "invalid-key".into());
    settle().await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_address_change_publishes_aliases() {
    let (fake, store) = setup();
    let connman = connman(&fake, &store).await;
    let wifi = connman.wifi().await.unwrap();
    let mut rx = wifi.subscribe();
    settle().await;
    drain(&mut rx);

    fake.emit_service_property("wifi_home", "IPv4", ipv4("192.168.1.20"));
    settle().await;

    let names: Vec<_> = connection_changes(&drain(&mut rx))
        .into_iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    assert_eq!(names[1..], ["ip4Address=192.168.1.20", "ipaddress=192.168.1.20"]);
    assert_eq!(names[0].split('=').next(), Some("iPv4"));
    assert_eq!(wifi.connection_properties().ipaddress, "192.168.1.20");

    // Same address again: nothing new
    fake.emit_service_property("wifi_home", "IPv4", ipv4("192.168.1.20"));
    settle().await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_services_update_clears_inactive_service() {
    let (fake, store) = setup();
    let connman = connman(&fake, &store).await;
    let wifi = connman.wifi().await.unwrap();
    let mut rx = wifi.subscribe();
    settle().await;
    drain(&mut rx);

    fake.set_service_property_silently("wifi_home", "State", "idle".into());
    fake.emit_services_changed();
    settle().await;

    let events = drain(&mut rx);
    assert!(matches!(events.first(), Some(Event::ServicesChanged(list)) if list.len() == 2));
    assert!(events.contains(&Event::ServiceChanged(None)));
    assert!(connection_changes(&events).contains(&("ssid".into(), "".into())));

    let current = wifi.connection_properties();
    assert_eq!(current.state, ServiceState::Idle);
    assert_eq!(current.ssid, "");
    assert_eq!(current.strength, 0);
}

#[tokio::test(start_paused = true)]
async fn test_services_update_switches_to_active_service() {
    let (fake, store) = setup();
    let connman = connman(&fake, &store).await;
    let wifi = connman.wifi().await.unwrap();
    let mut rx = wifi.subscribe();
    settle().await;
    drain(&mut rx);

    // ConnMan auto-connected to another network on its own
    fake.set_service_property_silently("wifi_home", "State", "idle".into());
    fake.set_service_property_silently("wifi_cafe", "State", "association".into());
    fake.emit_services_changed();
    settle().await;

    let events = drain(&mut rx);
    assert!(events.contains(&Event::ServiceChanged(Some("wifi_cafe".into()))));
    assert_eq!(wifi.connection_properties().ssid, "cafe");

    // Changes of the previous service are ignored
    fake.emit_service_property("wifi_home", "Strength", PropertyValue::Int(10));
    settle().await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_tethering_toggle_is_published() {
    let (fake, store) = setup();
    let connman = connman(&fake, &store).await;
    let wifi = connman.wifi().await.unwrap();
    let mut rx = wifi.subscribe();
    settle().await;
    drain(&mut rx);

    fake.emit_technology_property(TechnologyKind::Wifi, "Tethering", true.into());
    settle().await;

    assert_eq!(
        drain(&mut rx),
        vec![Event::PropertyChanged {
            name: "tethering".into(),
            value: true.into(),
        }]
    );
    assert!(wifi.is_tethering());
}

#[tokio::test(start_paused = true)]
async fn test_set_property_uses_wire_name() {
    let (fake, store) = setup();
    let connman = connman(&fake, &store).await;
    let wifi = connman.wifi().await.unwrap();

    wifi.set_property("tetheringIdentifier", "device-setup")
        .await
        .unwrap();
    assert_eq!(fake.calls(), vec!["set:TetheringIdentifier=device-setup"]);
}
