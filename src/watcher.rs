use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::{BlockId, BlockListener};
use crate::reader::RpcReader;

/// Polls the chain head forever and feeds every block to `listener`.
pub async fn start_block_watcher<L: BlockListener>(
    reader: Arc<RpcReader>,
    listener: L,
    interval: Duration,
) {
    info!(
        node = %reader.url(),
        interval_ms = %interval.as_millis(),
        "starting block watcher"
    );

    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        poll_once(&reader, &listener).await;
    }
}

/// Reads the head once. Duplicates are left to the listener.
pub async fn poll_once<L: BlockListener + ?Sized>(
    reader: &RpcReader,
    listener: &L,
) -> Option<BlockId> {
    match reader.block_number().await {
        Ok(block) => {
            if listener.on_new_block(block) {
                debug!(block = %block, "new block");
            }
            Some(block)
        }
        Err(e) => {
            warn!(node = %reader.url(), error = %e, "block poll failed");
            None
        }
    }
}
