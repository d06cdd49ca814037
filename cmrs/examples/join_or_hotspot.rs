/// Typical device provisioning flow: join a known network, or open a
/// hotspot so the device can be configured.
use cmrs::{ConnMan, ConnmanError, HotspotConfig};

#[tokio::main]
async fn main() -> cmrs::Result<()> {
    let connman = ConnMan::new().await?;
    let wifi = connman.wifi().await?;

    match wifi.join_favorite().await {
        Ok(()) => {
            let current = wifi.connection_properties();
            println!("Joined '{}' ({})", current.ssid, current.ipaddress);
        }
        Err(ConnmanError::NoFavorite) => {
            println!("No known network in range, opening hotspot");
            wifi.open_hotspot(HotspotConfig::new("device-setup", "setup1234"))
                .await?;
            println!("Hotspot 'device-setup' is up");
        }
        Err(e) => return Err(e),
    }

    Ok(())
}
