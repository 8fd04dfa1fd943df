//! Forwarding of `/audioproxy/<name>/...` requests to their file store.
//!
//! The upstream response is relayed as it arrives. A client that hangs up
//! mid-body only ends its own relay: the body stream is dropped, one warning
//! is logged, and the server carries on.

use crate::audioproxy::{AudioProxy, AudioProxyRegistry, split_proxied_path};
use crate::error::ApiError;
use axum::{
    body::{Body, Bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use futures::{Stream, StreamExt};
use reqwest::{Client, Url, redirect};
use std::time::Duration;
use tracing::{debug, error, warn};

pub const MAX_FORWARD_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Connection-scoped headers; never forwarded in either direction.
const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|hop| name.eq_ignore_ascii_case(hop))
}

#[derive(Clone)]
pub struct ReverseProxyForwarder {
    client: Client,
    response_timeout: Duration,
}

impl ReverseProxyForwarder {
    /// `timeout` bounds connecting and waiting for response headers; relayed
    /// bodies may take as long as they need.
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            response_timeout: timeout,
        })
    }

    pub async fn forward(
        &self,
        proxies: &AudioProxyRegistry,
        req: Request<Body>,
    ) -> Result<Response, ApiError> {
        let path = req.uri().path().to_string();
        let (name, file) = split_proxied_path(&path).ok_or(ApiError::NotFound)?;

        let Some(proxy) = proxies.get(name) else {
            debug!("audioproxy: no proxy named {:?}", name);
            return Err(ApiError::NotFound);
        };

        let Some(target) = proxy.upstream_url(file, req.uri().query()) else {
            warn!(proxy = %proxy.name, path = %path, "audioproxy: path escapes the store, refused");
            return Err(ApiError::NotFound);
        };

        self.relay(proxy, target, req).await
    }

    async fn relay(
        &self,
        proxy: &AudioProxy,
        target: Url,
        req: Request<Body>,
    ) -> Result<Response, ApiError> {
        let (parts, body) = req.into_parts();

        let method = reqwest::Method::from_bytes(parts.method.as_str().as_bytes())
            .map_err(|_| ApiError::BadRequest(format!("unsupported method {}", parts.method)))?;
        let body = read_body(body, MAX_FORWARD_BODY_BYTES).await?;

        let mut outbound = self.client.request(method, target.clone());
        for (name, value) in parts.headers.iter() {
            // reqwest derives host and content-length from the target and body.
            if is_hop_by_hop(name.as_str())
                || *name == header::HOST
                || *name == header::CONTENT_LENGTH
            {
                continue;
            }
            outbound = outbound.header(name.as_str(), value.as_bytes());
        }
        if !body.is_empty() {
            outbound = outbound.body(body);
        }

        debug!(proxy = %proxy.name, method = %parts.method, upstream = %target, "audioproxy: forwarding");

        let upstream = match tokio::time::timeout(self.response_timeout, outbound.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(proxy = %proxy.name, upstream = %target, error = %e, "audioproxy: upstream request failed");
                return Err(ApiError::BadGateway(format!(
                    "audio store {} is unreachable",
                    proxy.name
                )));
            }
            Err(_) => {
                warn!(proxy = %proxy.name, upstream = %target, "audioproxy: upstream timed out");
                return Err(ApiError::GatewayTimeout(format!(
                    "audio store {} did not respond in time",
                    proxy.name
                )));
            }
        };

        let status = upstream.status().as_u16();
        let mut builder = Response::builder().status(status);
        for (name, value) in upstream.headers() {
            if is_hop_by_hop(name.as_str()) {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_bytes());
        }

        let body = if parts.method == Method::HEAD || !has_body(status) {
            Body::empty()
        } else {
            let progress = RelayProgress {
                proxy: proxy.name.clone(),
                upstream: target.to_string(),
                expected: upstream.content_length(),
                relayed: 0,
                finished: false,
            };
            Body::from_stream(relay_body(Box::pin(upstream.bytes_stream()), progress))
        };

        builder.body(body).map_err(|e| {
            error!(proxy = %proxy.name, upstream = %target, error = %e, "audioproxy: invalid upstream response");
            ApiError::BadGateway(format!("audio store {} sent an invalid response", proxy.name))
        })
    }
}

/// Buffers the inbound body, refusing anything over `limit` bytes.
async fn read_body(body: Body, limit: usize) -> Result<Bytes, ApiError> {
    let mut chunks = body.into_data_stream();
    let mut buffered = Vec::new();

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk
            .map_err(|e| ApiError::BadRequest(format!("failed to read request body: {}", e)))?;
        if buffered.len() + chunk.len() > limit {
            return Err(ApiError::PayloadTooLarge(format!(
                "request body exceeds {} bytes",
                limit
            )));
        }
        buffered.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(buffered))
}

fn has_body(status: u16) -> bool {
    !(100..200).contains(&status)
        && status != StatusCode::NO_CONTENT.as_u16()
        && status != StatusCode::NOT_MODIFIED.as_u16()
}

/// Bookkeeping for one relayed body. Dropping it before the upstream body
/// was fully handed over means the client went away.
struct RelayProgress {
    proxy: String,
    upstream: String,
    expected: Option<u64>,
    relayed: u64,
    finished: bool,
}

impl RelayProgress {
    fn record(&mut self, chunk: &Bytes) {
        self.relayed += chunk.len() as u64;
        if self.expected.is_some_and(|expected| self.relayed >= expected) {
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for RelayProgress {
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                proxy = %self.proxy,
                upstream = %self.upstream,
                relayed = self.relayed,
                expected = ?self.expected,
                "audioproxy: client went away before the response was relayed (recovered)"
            );
        }
    }
}

fn relay_body<S, E>(upstream: S, progress: RelayProgress) -> impl Stream<Item = Result<Bytes, E>>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    futures::stream::unfold((upstream, progress), |(mut upstream, mut progress)| async move {
        match upstream.next().await {
            Some(Ok(chunk)) => {
                progress.record(&chunk);
                Some((Ok(chunk), (upstream, progress)))
            }
            Some(Err(e)) => {
                progress.finish();
                warn!(
                    proxy = %progress.proxy,
                    upstream = %progress.upstream,
                    relayed = progress.relayed,
                    error = %e,
                    "audioproxy: upstream body failed mid-stream"
                );
                Some((Err(e), (upstream, progress)))
            }
            None => {
                progress.finish();
                None
            }
        }
    })
}
