use std::{num::NonZeroUsize, thread};

use crate::{PoolErr, Result};

/// Execution bounds for a worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    workers: NonZeroUsize,
    channel_capacity: NonZeroUsize,
}

impl PoolConfig {
    /// Creates a new pool configuration.
    ///
    /// # Args
    /// * `workers` - The maximum amount of workers to start.
    /// * `channel_capacity` - The amount of results that may be in flight before workers block.
    ///
    /// # Returns
    /// A `PoolConfig` instance, or an error if either bound is zero.
    pub fn new(workers: usize, channel_capacity: usize) -> Result<Self> {
        let workers = NonZeroUsize::new(workers).ok_or(PoolErr::NoWorkers)?;
        let channel_capacity =
            NonZeroUsize::new(channel_capacity).ok_or(PoolErr::ZeroChannelCapacity)?;

        Ok(Self {
            workers,
            channel_capacity,
        })
    }

    /// Creates a configuration with one worker per available processing unit.
    pub fn available(channel_capacity: usize) -> Result<Self> {
        let workers = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        Self::new(workers, channel_capacity)
    }

    pub fn workers(&self) -> usize {
        self.workers.get()
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity.get()
    }
}
