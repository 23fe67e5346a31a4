use async_trait::async_trait;
use rover_primitives::ChainTag;

use crate::{errors::DriverError, planner::Batch};

/// Seam between the shared sync machinery and a chain's io layer.
///
/// The Ethereum implementation fans batches out over its peer pool; the
/// Lisk implementation pages through the HTTP api. Either way the driver
/// owns the network and reports blocks back on the rover's event channel.
#[async_trait]
pub trait ChainDriver: Send + Sync + 'static {
    fn chain(&self) -> ChainTag;

    /// Height of the remote tip as currently known to the io layer.
    async fn remote_tip(&self) -> Result<u64, DriverError>;

    /// Requests every height in `batch` from the network. The batch's
    /// heights are already in the shared requested set when this is called.
    async fn dispatch_batch(&self, batch: Batch) -> Result<(), DriverError>;
}

/// What the io layer reports up to the control loop.
#[derive(Debug)]
pub enum RoverEvent<B> {
    /// A block that passed chain-native validation.
    Block {
        block: B,
        /// Whether it arrived in response to a batch request rather than
        /// from the live tip.
        from_initial_sync: bool,
    },
    /// The live tip jumped ahead of the best-seen block; `[from, to]`
    /// needs a fill.
    Gap { from: u64, to: u64 },
}
