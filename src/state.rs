use crate::audioproxy::{AudioProxyRegistry, ProxyConfigError};
use crate::config::Config;
use crate::emotext::EmotextClient;
use crate::forward::ReverseProxyForwarder;
use crate::musicstore::MusicstoreClient;
use tracing::info;

/// Everything a request needs. Built once before serving; read-only after.
pub struct AppState {
    pub emotext: EmotextClient,
    pub musicstore: MusicstoreClient,
    pub audio_proxies: AudioProxyRegistry,
    pub forwarder: ReverseProxyForwarder,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid audio proxy configuration: {0}")]
    AudioProxies(#[from] ProxyConfigError),

    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self, StartupError> {
        let timeout = config.upstream_timeout();
        let audio_proxies = AudioProxyRegistry::parse(&config.audio_proxies)?;

        for proxy in audio_proxies.iter() {
            info!("Audio proxy {}", proxy);
        }
        info!("Loaded {} audio proxies", audio_proxies.len());

        Ok(Self {
            emotext: EmotextClient::new(config.emotext_server.clone(), timeout)?,
            musicstore: MusicstoreClient::new(config.musicstore_murecom.clone(), timeout)?,
            audio_proxies,
            forwarder: ReverseProxyForwarder::new(timeout)?,
        })
    }
}
