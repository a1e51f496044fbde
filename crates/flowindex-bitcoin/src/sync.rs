//! Wait for the node to finish syncing before indexing starts.

use std::time::Duration;

use flowindex_core::error::IndexerError;
use flowindex_core::shutdown::ShutdownToken;

use crate::node::BitcoinNode;
use crate::transport::RpcTransport;

/// Poll `getblockchaininfo` until the node has validated every known header.
///
/// Returns `Ok(true)` once synced and `Ok(false)` if shutdown was requested
/// first. Retryable RPC errors (node warming up, connection refused, timeouts)
/// are logged and polled through; any other RPC error is returned.
pub async fn wait_for_sync<T: RpcTransport>(
    node: &BitcoinNode<T>,
    shutdown: &ShutdownToken,
    poll: Duration,
) -> Result<bool, IndexerError> {
    loop {
        if shutdown.is_triggered() {
            return Ok(false);
        }

        let info = match node.get_blockchain_info().await {
            Ok(info) => info,
            Err(err) if err.is_retryable() => {
                tracing::warn!(error = %err, "Node not reachable yet; retrying sync check");
                if !shutdown.sleep(poll).await {
                    return Ok(false);
                }
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        if info.is_synced() {
            tracing::info!(chain = %info.chain, blocks = info.blocks, "Node is synced");
            return Ok(true);
        }

        tracing::info!(
            chain = %info.chain,
            blocks = info.blocks,
            headers = info.headers,
            ibd = info.initial_block_download,
            progress_pct = %format!("{:.2}", info.verification_progress * 100.0),
            "Waiting for node sync"
        );
        if !shutdown.sleep(poll).await {
            return Ok(false);
        }
    }
}
