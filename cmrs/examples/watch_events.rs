use cmrs::{ConnMan, Event};

#[tokio::main]
async fn main() -> cmrs::Result<()> {
    let connman = ConnMan::new().await?;
    let wifi = connman.wifi().await?;

    // The first subscriber receives a replay of the initial state
    let mut events = wifi.subscribe();

    println!("Watching WiFi state (Ctrl+C to stop)...");
    while let Ok(event) = events.recv().await {
        match event {
            Event::PropertyChanged { name, value } => println!("wifi      {name} = {value}"),
            Event::ConnectionPropertyChanged { name, value } => {
                println!("service   {name} = {value}")
            }
            Event::ServiceChanged(Some(id)) => println!("current   {id}"),
            Event::ServiceChanged(None) => println!("current   <none>"),
            Event::ServicesChanged(networks) => println!("networks  {} visible", networks.len()),
        }
    }

    Ok(())
}
