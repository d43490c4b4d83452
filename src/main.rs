use ibc_packet_scan::core::{config::Config, logging, scan::Scanner};
use ibc_packet_scan::cosmos::client::CosmosClient;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    logging::setup_logging();
    let config = Config::load()?;
    let client = CosmosClient::new(config.chain.clone())?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!(target: "ibc-packet-scan", "🛑 Interrupt received, flushing after the current block");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut scanner = Scanner::new(client, config.scan)?;
    let report = scanner.run(&shutdown_rx).await?;
    for checkpoint in report.checkpoints.iter().filter(|checkpoint| checkpoint.is_final) {
        for path in &checkpoint.paths {
            log::info!(target: "ibc-packet-scan", "✅ Final table saved: {}", path.display());
        }
    }
    if !report.failed_heights.is_empty() {
        log::warn!(
            target: "ibc-packet-scan",
            "⚠️ {} heights could not be fetched: {:?}",
            report.failed_heights.len(),
            report.failed_heights
        );
    }
    Ok(())
}
