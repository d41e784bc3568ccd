use adaptive_signals::global_variables::{AMQP_URL, INCIDENTS_CSV, LIGHT_ADJUSTMENTS_CSV};
use adaptive_signals::monitoring::amqp::{listen_incidents, listen_light_adjustments};
use std::path::PathBuf;
use tokio::join;

#[tokio::main]
async fn main() {
    env_logger::init();

    let url = std::env::args().nth(1).unwrap_or_else(|| AMQP_URL.to_string());
    let dir = PathBuf::from(std::env::args().nth(2).unwrap_or_else(|| "monitor".to_string()));
    if let Err(e) = std::fs::create_dir_all(&dir) {
        log::error!("Cannot create {}: {}", dir.display(), e);
        return;
    }

    let incidents_listener = tokio::spawn(listen_incidents(url.clone(), dir.join(INCIDENTS_CSV)));
    let adjustments_listener =
        tokio::spawn(listen_light_adjustments(url, dir.join(LIGHT_ADJUSTMENTS_CSV)));

    let (incidents, adjustments) = join!(incidents_listener, adjustments_listener);
    for (name, outcome) in [("incidents", incidents), ("light adjustments", adjustments)] {
        match outcome {
            Ok(Ok(())) => log::info!("{} listener finished", name),
            Ok(Err(e)) => log::error!("Error in {} listener: {}", name, e),
            Err(e) => log::error!("{} listener panicked: {}", name, e),
        }
    }
}
