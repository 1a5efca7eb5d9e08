//! Propagation tasks.
//!
//! A propagation task notifies every remote mint involved in a canonical
//! record that it changed. Receivers pull the record back from this mint,
//! so the notice itself carries nothing but the id, and receiving it twice
//! is harmless. All pushes of one attempt are tried; if any fails the whole
//! task is retried.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Task, TaskError, TaskKind};
use crate::client::Resource;
use crate::context::MintContext;
use crate::storage::LedgerRead;
use crate::types::{AssetName, Propagation, host_of};

/// Propagation gives up after this many failed attempts, roughly 36 hours
/// after the first one.
pub const PROPAGATION_MAX_RETRIES: u32 = 18;

/// Distinct non-local hosts, in first-seen order.
fn remote_hosts(ctx: &MintContext, hosts: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for host in hosts {
        if !ctx.is_local(&host) && !out.iter().any(|h| h.eq_ignore_ascii_case(&host)) {
            out.push(host);
        }
    }
    out
}

async fn push_all(
    ctx: &MintContext,
    resource: Resource,
    id: &str,
    hosts: Vec<String>,
) -> Result<(), TaskError> {
    let mut failures = Vec::new();
    for host in hosts {
        match ctx.client.push_propagation(resource, id, &host).await {
            Ok(()) => debug!(%id, %host, "propagation delivered"),
            Err(e) => {
                warn!(%id, %host, error = %e, "propagation push failed");
                failures.push(format!("{host}: {e}"));
            }
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(TaskError::Retryable(failures.join("; ")))
    }
}

/// Pushes a canonical operation to the mints of its source and destination.
pub struct PropagateOperation {
    id: String,
}

impl PropagateOperation {
    pub fn new(id: String) -> Self {
        Self { id }
    }
}

#[async_trait]
impl Task for PropagateOperation {
    fn kind(&self) -> TaskKind {
        TaskKind::PropagateOperation
    }

    fn subject(&self) -> &str {
        &self.id
    }

    fn max_retries(&self) -> u32 {
        PROPAGATION_MAX_RETRIES
    }

    async fn execute(&self, ctx: &MintContext) -> Result<(), TaskError> {
        let op = ctx
            .store
            .operation(&self.id)
            .map_err(|e| TaskError::Retryable(e.to_string()))?
            .ok_or_else(|| TaskError::Fatal(format!("operation {} not found", self.id)))?;
        if op.propagation != Propagation::Canonical {
            return Err(TaskError::Fatal(format!(
                "operation {} is not canonical on this mint",
                self.id
            )));
        }

        let source = host_of(&op.source).map_err(|e| TaskError::Fatal(e.to_string()))?;
        let destination = host_of(&op.destination).map_err(|e| TaskError::Fatal(e.to_string()))?;
        let hosts = remote_hosts(ctx, [source, destination]);
        push_all(ctx, Resource::Operation, &op.id, hosts).await
    }
}

/// Pushes a canonical offer to the mints issuing its base and quote assets.
pub struct PropagateOffer {
    id: String,
}

impl PropagateOffer {
    pub fn new(id: String) -> Self {
        Self { id }
    }
}

#[async_trait]
impl Task for PropagateOffer {
    fn kind(&self) -> TaskKind {
        TaskKind::PropagateOffer
    }

    fn subject(&self) -> &str {
        &self.id
    }

    fn max_retries(&self) -> u32 {
        PROPAGATION_MAX_RETRIES
    }

    async fn execute(&self, ctx: &MintContext) -> Result<(), TaskError> {
        let offer = ctx
            .store
            .offer(&self.id)
            .map_err(|e| TaskError::Retryable(e.to_string()))?
            .ok_or_else(|| TaskError::Fatal(format!("offer {} not found", self.id)))?;
        if offer.propagation != Propagation::Canonical {
            return Err(TaskError::Fatal(format!(
                "offer {} is not canonical on this mint",
                self.id
            )));
        }

        let issuer_host = |name: &str| {
            AssetName::parse(name)
                .and_then(|asset| asset.issuer_host())
                .map_err(|e| TaskError::Fatal(e.to_string()))
        };
        let hosts = remote_hosts(
            ctx,
            [issuer_host(&offer.base_asset)?, issuer_host(&offer.quote_asset)?],
        );
        push_all(ctx, Resource::Offer, &offer.id, hosts).await
    }
}
