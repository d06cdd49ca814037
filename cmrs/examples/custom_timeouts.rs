/// Example demonstrating custom timing configuration for slow radios.
///
/// Some Wi-Fi chips take longer to come up after being powered, or need
/// more scan rounds before a network shows up. Both budgets are tunable.
use cmrs::{Config, ConnMan, HotspotConfig, TimeoutConfig};
use std::time::Duration;

#[tokio::main]
async fn main() -> cmrs::Result<()> {
    let timeouts = TimeoutConfig::new()
        .with_enable_settle(Duration::from_secs(5)) // Slow radio power-up
        .with_service_attempts(10) // Look for a network up to 10 times
        .with_hotspot_timeout(Duration::from_secs(30));

    let config = Config::new()
        .with_timeouts(timeouts)
        .with_hotspot(HotspotConfig::new("device-setup", "setup1234"));

    let connman = ConnMan::with_config(config).await?;

    println!("ConnMan configured with custom timeouts:");
    println!("  Enable settle: {:?}", connman.config().timeouts.enable_settle);
    println!(
        "  Service lookups: {} x {:?}",
        connman.config().timeouts.service_attempts,
        connman.config().timeouts.service_attempt_delay
    );

    let wifi = connman.wifi().await?;

    println!("\nJoining network...");
    wifi.join(
        "MyNetwork",
        Some(&std::env::var("WIFI_PASSWORD").unwrap_or_else(|_| "password".to_string())),
    )
    .await?;

    println!("Connected to {}", wifi.connection_properties().ssid);

    Ok(())
}
