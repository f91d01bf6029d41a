//! Host and share enumeration collaborators
//!
//! Directory-service lookups and remote share enumeration live outside the
//! crawler. They are reached through [`DirectoryService`] and
//! [`ShareEnumerator`]; the inventory implementations below serve hosts and
//! shares declared in the configuration file.

use crate::config::InventoryConfig;
use anyhow::{Context, Result, bail};
use regex::RegexBuilder;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// One share as reported by a host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareInfo {
    pub name: String,
    /// Filesystem path backing the share; `None` for printer and IPC shares
    pub path: Option<String>,
    pub description: Option<String>,
}

/// Resolves the hosts to crawl from a filter string
pub trait DirectoryService: Send + Sync {
    fn hosts(&self, filter: &str) -> Result<Vec<String>>;
}

/// Lists the shares exposed by one host
pub trait ShareEnumerator: Send + Sync {
    fn list_shares(&self, host: &str, timeout: Duration) -> Result<Vec<ShareInfo>>;
}

/// Directory service backed by the configured inventory
///
/// The filter is a case-insensitive regular expression over host names.
#[derive(Debug, Clone, Default)]
pub struct InventoryDirectory {
    hosts: Vec<String>,
}

impl InventoryDirectory {
    pub fn new(inventory: &InventoryConfig) -> Self {
        Self {
            hosts: inventory.hosts.iter().map(|host| host.name.clone()).collect(),
        }
    }
}

impl DirectoryService for InventoryDirectory {
    fn hosts(&self, filter: &str) -> Result<Vec<String>> {
        let filter = RegexBuilder::new(filter)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("Invalid host filter '{filter}'"))?;

        Ok(self
            .hosts
            .iter()
            .filter(|host| filter.is_match(host))
            .cloned()
            .collect())
    }
}

/// Share enumerator backed by the configured inventory
///
/// With a probe port configured, a host only answers when a TCP connection
/// to that port succeeds within the timeout.
#[derive(Debug, Clone, Default)]
pub struct InventoryShareEnumerator {
    inventory: InventoryConfig,
}

impl InventoryShareEnumerator {
    pub fn new(inventory: InventoryConfig) -> Self {
        Self { inventory }
    }

    fn probe(host: &str, port: u16, timeout: Duration) -> Result<()> {
        let addresses = (host, port)
            .to_socket_addrs()
            .with_context(|| format!("Couldn't resolve {host}"))?;

        let mut last_error = None;
        for address in addresses {
            match TcpStream::connect_timeout(&address, timeout) {
                Ok(_) => return Ok(()),
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(e) => Err(e).with_context(|| format!("{host}:{port} unreachable")),
            None => bail!("{host} has no addresses"),
        }
    }
}

impl ShareEnumerator for InventoryShareEnumerator {
    fn list_shares(&self, host: &str, timeout: Duration) -> Result<Vec<ShareInfo>> {
        let entry = self
            .inventory
            .hosts
            .iter()
            .find(|candidate| candidate.name.eq_ignore_ascii_case(host))
            .with_context(|| format!("{host} is not in the inventory"))?;

        if let Some(port) = self.inventory.probe_port {
            Self::probe(host, port, timeout)?;
        }

        Ok(entry
            .shares
            .iter()
            .map(|share| ShareInfo {
                name: share.name.clone(),
                path: share.path.clone(),
                description: share.description.clone(),
            })
            .collect())
    }
}
