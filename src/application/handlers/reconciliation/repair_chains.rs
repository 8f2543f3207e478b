//! RepairChainsHandler - restores missing forward links in renewal chains.
//!
//! A renewal carries `last_chain` from the moment it is written, but a
//! predecessor's `next_chain` can be missing in rows written before the
//! link was made transactional. The sweep rebuilds those pointers.

use std::sync::Arc;

use crate::domain::foundation::DomainError;
use crate::ports::{BrokenLink, OrderLedger};

#[derive(Debug, Clone, Copy, Default)]
pub struct RepairChainsCommand {
    /// Report broken links without writing.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairChainsResult {
    pub found: Vec<BrokenLink>,
    pub repaired: usize,
    /// Links another writer fixed between the scan and the write.
    pub already_linked: usize,
}

pub struct RepairChainsHandler {
    ledger: Arc<dyn OrderLedger>,
}

impl RepairChainsHandler {
    pub fn new(ledger: Arc<dyn OrderLedger>) -> Self {
        Self { ledger }
    }

    pub async fn handle(&self, cmd: RepairChainsCommand) -> Result<RepairChainsResult, DomainError> {
        let found = self.ledger.find_broken_links().await?;
        let mut result = RepairChainsResult {
            found,
            ..Default::default()
        };

        if cmd.dry_run {
            for link in &result.found {
                tracing::info!(predecessor = %link.predecessor, successor = %link.successor, "Broken link (dry run)");
            }
            return Ok(result);
        }

        for link in &result.found {
            if self.ledger.link_next(&link.predecessor, &link.successor).await? {
                tracing::info!(predecessor = %link.predecessor, successor = %link.successor, "Chain link repaired");
                result.repaired += 1;
            } else {
                result.already_linked += 1;
            }
        }

        tracing::info!(
            found = result.found.len(),
            repaired = result.repaired,
            already_linked = result.already_linked,
            "Chain repair finished"
        );
        Ok(result)
    }
}
