//! Last-known-good schedule shared between readers and a refresher.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::RwLock;

use crate::{
    error::TariffError,
    prelude::*,
    tariff::{RawSchedule, TariffSchedule},
};

/// Message to the refresher.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Invalidation {
    /// The snapshot is stale and should be fetched again.
    Schedule,
}

/// Atomically swapped schedule snapshot.
///
/// Readers clone the [`Arc`] and never wait for a refresh: validation happens before the lock.
pub struct ScheduleCache {
    snapshot: RwLock<Arc<TariffSchedule>>,
    is_stale: AtomicBool,
    invalidations: Sender<Invalidation>,
}

impl ScheduleCache {
    /// Create the cache along with the receiving end for the refresher.
    #[must_use]
    pub fn new(schedule: TariffSchedule) -> (Self, Receiver<Invalidation>) {
        let (invalidations, receiver) = crossbeam_channel::bounded(1);
        let this = Self {
            snapshot: RwLock::new(Arc::new(schedule)),
            is_stale: AtomicBool::new(false),
            invalidations,
        };
        (this, receiver)
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<TariffSchedule> {
        Arc::clone(&self.snapshot.read())
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.is_stale.load(Ordering::Acquire)
    }

    /// Mark the snapshot stale and notify the refresher.
    ///
    /// A pending notification is not duplicated.
    pub fn invalidate_schedule(&self) {
        self.is_stale.store(true, Ordering::Release);
        match self.invalidations.try_send(Invalidation::Schedule) {
            Ok(()) => debug!("requested a schedule refresh"),
            Err(TrySendError::Full(_)) => trace!("a refresh is already pending"),
            Err(TrySendError::Disconnected(_)) => warn!("no refresher is listening"),
        }
    }

    /// Validate the new schedule and swap it in.
    ///
    /// On a validation failure the previous snapshot stays in place and remains stale.
    #[instrument(skip_all)]
    pub fn publish(&self, raw: RawSchedule) -> Result<Arc<TariffSchedule>, TariffError> {
        let schedule = Arc::new(TariffSchedule::try_from(raw).inspect_err(|error| {
            warn!(%error, "rejected the new schedule, keeping the last known good one");
        })?);
        *self.snapshot.write() = Arc::clone(&schedule);
        self.is_stale.store(false, Ordering::Release);
        info!(code = ?schedule.code(), "published a new schedule");
        Ok(schedule)
    }
}
