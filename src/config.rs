use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "murecom-gateway")]
#[command(about = "Music recommendation gateway for the reader")]
#[command(version)]
pub struct Config {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8007", env = "LISTEN_ADDR")]
    pub listen_addr: SocketAddr,

    /// Emotion analysis endpoint (page text is POSTed here)
    #[arg(long, default_value = "http://127.0.0.1:9003", env = "EMOTEXT_SERVER")]
    pub emotext_server: String,

    /// Music store recommendation endpoint
    #[arg(
        long,
        default_value = "http://127.0.0.1:8080/murecom",
        env = "MUSICSTORE_MURECOM_SERVER"
    )]
    pub musicstore_murecom: String,

    /// Audio file stores as name=address pairs, comma separated
    #[arg(long, default_value = "", env = "AUDIO_PROXIES")]
    pub audio_proxies: String,

    /// Time limit for each upstream call (proxying: until response headers)
    #[arg(long, default_value_t = 10, env = "UPSTREAM_TIMEOUT_SECS")]
    pub upstream_timeout_secs: u64,

    /// How long in-flight requests may run after a shutdown signal
    #[arg(long, default_value_t = 5, env = "SHUTDOWN_GRACE_SECS")]
    pub shutdown_grace_secs: u64,
}

impl Config {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
