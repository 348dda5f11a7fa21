use moka::sync::Cache;

/// Block number as reported by the chain head watcher.
pub type BlockId = u64;

/// Receives the new-block heartbeat.
pub trait BlockListener: Send + Sync + 'static {
    /// Returns false when the block had already been processed.
    fn on_new_block(&self, block: BlockId) -> bool;
}

/// Remembers which blocks were already processed and counts distinct ones.
///
/// Every distinct block bumps the epoch; an entry whose last fetch started
/// in an older epoch is stale.
pub(crate) struct BlockTracker {
    processed: Cache<BlockId, ()>,
    last_block: Option<BlockId>,
    epoch: u64,
}

impl BlockTracker {
    pub(crate) fn new(memory: u64) -> Self {
        Self {
            processed: Cache::new(memory),
            last_block: None,
            epoch: 0,
        }
    }

    /// Records `block`. Returns false for a block seen before.
    pub(crate) fn observe(&mut self, block: BlockId) -> bool {
        if self.processed.contains_key(&block) {
            return false;
        }
        self.processed.insert(block, ());
        self.last_block = Some(block);
        self.epoch += 1;
        true
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn last_block(&self) -> Option<BlockId> {
        self.last_block
    }
}
