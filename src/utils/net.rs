//! Hostname and IP resolution used when registering the tablet.

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use dns_lookup::getaddrinfo;
use dns_lookup::AddrInfoHints;
#[cfg(test)]
use mockall::automock;
use tracing::debug;

use crate::AgentError;
use crate::Result;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait HostResolver: Send + Sync + 'static {
    /// Fully qualified name of the local host.
    async fn local_hostname(&self) -> Result<String>;

    /// Primary IP address `hostname` resolves to.
    async fn lookup_ip(
        &self,
        hostname: &str,
    ) -> Result<IpAddr>;
}

/// Resolver backed by the operating system: the kernel hostname,
/// canonicalised through DNS, and getaddrinfo for addresses.
#[derive(Debug, Default)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn local_hostname(&self) -> Result<String> {
        let short = hostname::get()
            .map_err(|e| resolve_error("<local>", e))?
            .into_string()
            .map_err(|_| resolve_error("<local>", "hostname is not valid UTF-8"))?;
        if short.is_empty() {
            return Err(resolve_error("<local>", "empty hostname"));
        }
        canonical_hostname(short).await
    }

    async fn lookup_ip(
        &self,
        hostname: &str,
    ) -> Result<IpAddr> {
        let mut addrs = tokio::net::lookup_host((hostname, 0))
            .await
            .map_err(|e| resolve_error(hostname, e))?;
        let addr = addrs
            .next()
            .ok_or_else(|| resolve_error(hostname, "no addresses returned"))?;
        debug!(%hostname, ip = %addr.ip(), "hostname resolved");
        Ok(addr.ip())
    }
}

/// Resolver with a fixed local hostname and a fixed name table.
///
/// Used by the standalone daemon when DNS is not available for the
/// advertised hostname, and by tests.
#[derive(Debug, Clone)]
pub struct StaticResolver {
    hostname: String,
    addrs: HashMap<String, IpAddr>,
}

impl StaticResolver {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            addrs: HashMap::new(),
        }
    }

    pub fn with_addr(
        mut self,
        hostname: &str,
        ip: IpAddr,
    ) -> Self {
        self.addrs.insert(hostname.to_string(), ip);
        self
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    async fn local_hostname(&self) -> Result<String> {
        Ok(self.hostname.clone())
    }

    async fn lookup_ip(
        &self,
        hostname: &str,
    ) -> Result<IpAddr> {
        self.addrs
            .get(hostname)
            .copied()
            .ok_or_else(|| resolve_error(hostname, "unknown host"))
    }
}

/// Resolves `short` to its canonical DNS name.
///
/// Falls back to `short` when the name does not resolve or the resolver
/// returns no canonical name.
pub async fn canonical_hostname(short: String) -> Result<String> {
    let name = short.clone();
    let canonical = tokio::task::spawn_blocking(move || {
        let hints = AddrInfoHints {
            flags: libc::AI_CANONNAME,
            ..AddrInfoHints::default()
        };
        match getaddrinfo(Some(name.as_str()), None, Some(hints)) {
            Ok(mut infos) => infos.find_map(|info| info.ok().and_then(|info| info.canonname)),
            Err(e) => {
                debug!(hostname = %name, error = ?std::io::Error::from(e), "hostname has no DNS entry");
                None
            }
        }
    })
    .await
    .map_err(|e| resolve_error(&short, e))?;

    Ok(pick_canonical(short, canonical))
}

pub(crate) fn pick_canonical(
    short: String,
    canonical: Option<String>,
) -> String {
    match canonical {
        Some(name) if !name.is_empty() => {
            if name != short {
                debug!(%short, canonical = %name, "hostname canonicalised");
            }
            name
        }
        _ => short,
    }
}

fn resolve_error(
    hostname: &str,
    message: impl ToString,
) -> crate::Error {
    AgentError::Resolve {
        hostname: hostname.to_string(),
        message: message.to_string(),
    }
    .into()
}
