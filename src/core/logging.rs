use log::LevelFilter;

/// Log target shared by every scanner log line.
pub const TARGET: &str = "ibc-packet-scan";

pub fn setup_logging() {
    // tests may call this more than once
    let _ = env_logger::builder()
        .filter_module(TARGET, LevelFilter::Info)
        .filter_module("ibc_packet_scan", LevelFilter::Info)
        .format_module_path(false)
        .parse_default_env()
        .try_init();
}
