//! Named audio file stores reachable through `/audioproxy/<name>/...`.
//!
//! The registry is parsed once from `name=address,name=address` and is
//! read-only afterwards, so it can be shared across requests without locks.

use reqwest::Url;
use rustc_hash::FxHashMap;
use std::fmt;
use std::str::FromStr;

pub const AUDIO_PROXY_PREFIX: &str = "/audioproxy/";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ProxyConfigError {
    #[error("invalid proxy entry {entry:?}: expected name=address")]
    MalformedEntry { entry: String },

    #[error("invalid proxy entry {entry:?}: name and address must not be empty")]
    EmptyField { entry: String },

    #[error("invalid proxy entry {entry:?}: name must not contain '/'")]
    InvalidName { entry: String },

    #[error("invalid proxy entry {entry:?}: {reason}")]
    InvalidAddress { entry: String, reason: String },

    #[error("duplicate proxy name {0:?}")]
    DuplicateName(String),
}

/// One upstream file store.
#[derive(Debug, Clone)]
pub struct AudioProxy {
    pub name: String,
    pub address: String,
    base: Url,
    /// `address` without its query; proxied file paths are appended to it.
    file_root: String,
}

impl AudioProxy {
    fn parse(entry: &str) -> Result<Self, ProxyConfigError> {
        let fields: Vec<&str> = entry.split('=').collect();
        let [name, address] = fields.as_slice() else {
            return Err(ProxyConfigError::MalformedEntry {
                entry: entry.trim().to_string(),
            });
        };

        let (name, address) = (name.trim(), address.trim());
        if name.is_empty() || address.is_empty() {
            return Err(ProxyConfigError::EmptyField {
                entry: entry.trim().to_string(),
            });
        }
        if name.contains('/') {
            return Err(ProxyConfigError::InvalidName {
                entry: entry.trim().to_string(),
            });
        }

        let base = Url::parse(address).map_err(|e| ProxyConfigError::InvalidAddress {
            entry: entry.trim().to_string(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ProxyConfigError::InvalidAddress {
                entry: entry.trim().to_string(),
                reason: "address cannot be used as a base url".to_string(),
            });
        }

        let file_root = address
            .split(['?', '#'])
            .next()
            .unwrap_or(address)
            .to_string();

        Ok(Self {
            name: name.to_string(),
            address: address.to_string(),
            base,
            file_root,
        })
    }

    /// Rewrites `url` to its client-facing path if it lives under this store.
    ///
    /// Plain prefix comparison on the raw string: `http://h/a` and
    /// `http://h/a/` are different addresses, and percent-encoding is not
    /// normalized.
    pub fn hijack(&self, url: &str) -> Option<String> {
        url.strip_prefix(self.address.as_str())
            .map(|file| format!("{}{}/{}", AUDIO_PROXY_PREFIX, self.name, file))
    }

    /// Where a proxied request for `file` (the raw path after
    /// `/audioproxy/<name>/`) is sent: `file` is appended to the address
    /// as is, so a hijacked URL forwards back to itself.
    ///
    /// Returns `None` when `file` has `.` or `..` segments (plain or
    /// percent-encoded), which would climb out of the store.
    pub fn upstream_url(&self, file: &str, query: Option<&str>) -> Option<Url> {
        if file.split(['/', '\\']).any(is_dot_segment) {
            return None;
        }

        let mut url = Url::parse(&format!("{}{}", self.file_root, file)).ok()?;
        if url.host_str() != self.base.host_str()
            || url.port_or_known_default() != self.base.port_or_known_default()
            || !url.path().starts_with(self.base.path())
        {
            return None;
        }

        url.set_query(join_query(self.base.query(), query).as_deref());
        Some(url)
    }
}

impl fmt::Display for AudioProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.address)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AudioProxyRegistry {
    proxies: Vec<AudioProxy>,
    by_name: FxHashMap<String, usize>,
}

impl AudioProxyRegistry {
    /// All-or-nothing: one bad entry rejects the whole configuration.
    /// An empty (or blank) string disables proxying.
    pub fn parse(config: &str) -> Result<Self, ProxyConfigError> {
        let mut registry = Self::default();
        if config.trim().is_empty() {
            return Ok(registry);
        }

        for entry in config.split(',') {
            let proxy = AudioProxy::parse(entry)?;
            if registry.by_name.contains_key(&proxy.name) {
                return Err(ProxyConfigError::DuplicateName(proxy.name));
            }
            registry
                .by_name
                .insert(proxy.name.clone(), registry.proxies.len());
            registry.proxies.push(proxy);
        }

        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&AudioProxy> {
        self.by_name.get(name).map(|&index| &self.proxies[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &AudioProxy> {
        self.proxies.iter()
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Returns `(proxied_path, true)` when some store's address prefixes
    /// `url`, else `(url, false)`. The longest matching address wins; equal
    /// addresses resolve to the one configured first.
    pub fn hijack(&self, url: &str) -> (String, bool) {
        let best = self
            .proxies
            .iter()
            .filter(|proxy| url.starts_with(proxy.address.as_str()))
            .fold(None::<&AudioProxy>, |best, proxy| match best {
                Some(current) if current.address.len() >= proxy.address.len() => Some(current),
                _ => Some(proxy),
            });

        match best.and_then(|proxy| proxy.hijack(url)) {
            Some(path) => (path, true),
            None => (url.to_string(), false),
        }
    }
}

impl FromStr for AudioProxyRegistry {
    type Err = ProxyConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Splits a raw request path `/audioproxy/<name>/<file>` into
/// `(name, file)`. This undoes [`AudioProxy::hijack`]: only the slash right
/// after the name is removed. No percent-decoding happens here.
pub fn split_proxied_path(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix(AUDIO_PROXY_PREFIX)?;
    let (name, file) = match rest.split_once('/') {
        Some((name, file)) => (name, file),
        None => (rest, ""),
    };

    if name.is_empty() {
        None
    } else {
        Some((name, file))
    }
}

fn is_dot_segment(segment: &str) -> bool {
    let segment = segment.to_ascii_lowercase().replace("%2e", ".");
    segment == "." || segment == ".."
}

fn join_query(base: Option<&str>, inbound: Option<&str>) -> Option<String> {
    let base = base.filter(|q| !q.is_empty());
    let inbound = inbound.filter(|q| !q.is_empty());

    match (base, inbound) {
        (Some(base), Some(inbound)) => Some(format!("{}&{}", base, inbound)),
        (Some(query), None) | (None, Some(query)) => Some(query.to_string()),
        (None, None) => None,
    }
}
