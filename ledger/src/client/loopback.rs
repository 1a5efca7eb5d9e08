//! In-process peer network.
//!
//! [`LoopbackNetwork`] implements [`MintClient`] by dispatching calls
//! directly to the settlement entry points of mints registered in the same
//! process. Errors are translated into the same [`ClientError::Status`]
//! values an HTTP peer would produce, so settlement code cannot tell the
//! difference. Hosts can be taken offline to simulate partitions.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{ClientError, MintClient, Resource};
use crate::context::MintContext;
use crate::error::MintError;
use crate::settlement;
use crate::storage::LedgerStore;
use crate::types::{Offer, Operation, ResourceId, TransactionView};

#[derive(Default)]
pub struct LoopbackNetwork {
    mints: RwLock<HashMap<String, MintContext>>,
    offline: RwLock<HashSet<String>>,
}

impl LoopbackNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates an in-memory mint for `host` wired to this network.
    pub fn add_mint(self: &Arc<Self>, host: &str) -> MintContext {
        let ctx = MintContext::new(host, Arc::new(LedgerStore::in_memory()), self.clone());
        self.register(ctx.clone());
        ctx
    }

    /// Makes `ctx` reachable under its host, replacing any previous mint.
    pub fn register(&self, ctx: MintContext) {
        if let Ok(mut mints) = self.mints.write() {
            mints.insert(ctx.host.to_ascii_lowercase(), ctx);
        }
    }

    /// Marks `host` unreachable (or reachable again).
    pub fn set_offline(&self, host: &str, offline: bool) {
        if let Ok(mut hosts) = self.offline.write() {
            if offline {
                hosts.insert(host.to_ascii_lowercase());
            } else {
                hosts.remove(&host.to_ascii_lowercase());
            }
        }
    }

    fn target(&self, host: &str) -> Result<MintContext, ClientError> {
        let key = host.to_ascii_lowercase();
        let unreachable = |message: &str| ClientError::Transport {
            url: loopback_url(host),
            message: message.to_string(),
        };
        let offline = self
            .offline
            .read()
            .map_err(|_| unreachable("network lock poisoned"))?
            .contains(&key);
        if offline {
            return Err(unreachable("host offline"));
        }
        self.mints
            .read()
            .map_err(|_| unreachable("network lock poisoned"))?
            .get(&key)
            .cloned()
            .ok_or_else(|| unreachable("unknown host"))
    }

    fn owner_target(&self, id: &str) -> Result<MintContext, ClientError> {
        let host = ResourceId::parse(id)?.host()?;
        self.target(&host)
    }
}

fn loopback_url(host: &str) -> String {
    format!("loopback://{host}")
}

fn rejected(host: &str, err: MintError) -> ClientError {
    ClientError::Status {
        url: loopback_url(host),
        status: err.status(),
        code: err.code().to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl MintClient for LoopbackNetwork {
    async fn fetch_offer(&self, id: &str) -> Result<Offer, ClientError> {
        let peer = self.owner_target(id)?;
        settlement::retrieve_offer(&peer, id).map_err(|e| rejected(&peer.host, e))
    }

    async fn fetch_transaction(&self, id: &str) -> Result<TransactionView, ClientError> {
        let peer = self.owner_target(id)?;
        settlement::retrieve_transaction(&peer, id).map_err(|e| rejected(&peer.host, e))
    }

    async fn fetch_operation(&self, id: &str) -> Result<Operation, ClientError> {
        let peer = self.owner_target(id)?;
        settlement::retrieve_operation(&peer, id).map_err(|e| rejected(&peer.host, e))
    }

    async fn reserve_hop(&self, host: &str, id: &str, hop: u32) -> Result<TransactionView, ClientError> {
        let peer = self.target(host)?;
        settlement::reserve_hop(&peer, id, hop)
            .await
            .map(|reservation| reservation.view)
            .map_err(|e| rejected(host, e))
    }

    async fn push_propagation(&self, resource: Resource, id: &str, host: &str) -> Result<(), ClientError> {
        let peer = self.target(host)?;
        let result = match resource {
            Resource::Offer => settlement::receive_offer(&peer, id).await.map(|_| ()),
            Resource::Operation => settlement::receive_operation(&peer, id).await.map(|_| ()),
        };
        result.map_err(|e| rejected(host, e))
    }
}
