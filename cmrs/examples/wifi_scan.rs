use cmrs::ConnMan;

#[tokio::main]
async fn main() -> cmrs::Result<()> {
    let connman = ConnMan::new().await?;
    let wifi = connman.wifi().await?;

    println!("Scanning for WiFi networks...");
    let networks = wifi.get_networks().await?;

    for net in networks {
        let marker = if net.favorite { '*' } else { ' ' };
        println!(
            "{marker} {:30} {:>3}%  {:14} [{}]",
            net.ssid,
            net.strength,
            net.state.to_string(),
            net.security.join(", ")
        );
    }

    Ok(())
}
