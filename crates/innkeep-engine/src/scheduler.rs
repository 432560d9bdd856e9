//! # Auto-Confirm Scheduler
//!
//! Confirms QR deposits that nobody confirmed by hand.
//!
//! ## Tick
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     AutoConfirmScheduler::run_once                      │
//! │                                                                         │
//! │  1. Select (no lock, just a hint):                                     │
//! │       pending_confirmation + qr_transfer + token attached              │
//! │       session gone, or unconsumed and older than the TTL               │
//! │       booking older than the grace period                              │
//! │       oldest first, at most batch_size                                 │
//! │                                                                         │
//! │  2. For each candidate: BookingService::auto_confirm                   │
//! │       re-checks under the row lock, so a booking staff already        │
//! │       confirmed or cancelled is skipped, never overwritten             │
//! │                                                                         │
//! │  3. Purge payment sessions past their TTL                              │
//! │                                                                         │
//! │  A failed booking is logged and the tick moves on.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `pending_confirmation` is not a terminal state while this loop runs: a
//! QR deposit that was never verified ends up confirmed anyway. Staff who
//! need to refuse one must reject it inside the grace period.
//!
//! The TTL and the grace period are read from the service's [`HotelConfig`],
//! the same values `auto_confirm` re-checks under the lock. `SchedulerSettings`
//! only controls cadence and batch size here.
//!
//! [`HotelConfig`]: crate::config::HotelConfig

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::booking::BookingService;
use crate::config::SchedulerSettings;
use crate::error::EngineResult;

/// Outcome of one scheduler pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub selected: usize,
    pub confirmed: usize,
    /// Moved on by someone else between selection and lock.
    pub skipped: usize,
    pub failed: usize,
    pub purged_sessions: u64,
}

pub struct AutoConfirmScheduler {
    service: BookingService,
    settings: SchedulerSettings,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Stops a running scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SchedulerHandle {
    pub async fn shutdown(&self) {
        if self.shutdown_tx.send(()).await.is_err() {
            debug!("Scheduler already stopped");
        }
    }
}

impl AutoConfirmScheduler {
    pub fn new(service: BookingService, settings: SchedulerSettings) -> (Self, SchedulerHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let scheduler = AutoConfirmScheduler {
            service,
            settings,
            shutdown_rx,
        };
        (scheduler, SchedulerHandle { shutdown_tx })
    }

    /// Runs until the handle asks it to stop. Spawn as a background task.
    pub async fn run(mut self) {
        info!(
            interval_secs = self.settings.interval_secs,
            grace_minutes = self.service.config().auto_confirm_grace().num_minutes(),
            "Auto-confirm scheduler starting"
        );

        let period = std::time::Duration::from_secs(self.settings.interval_secs.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_once().await {
                        Ok(report) if report.selected > 0 || report.purged_sessions > 0 => {
                            info!(?report, "Auto-confirm tick finished");
                        }
                        Ok(_) => debug!("Auto-confirm tick found nothing to do"),
                        Err(e) => error!(error = %e, "Auto-confirm tick failed"),
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Auto-confirm scheduler shutting down");
                    break;
                }
            }
        }

        info!("Auto-confirm scheduler stopped");
    }

    /// One pass. Only candidate selection can fail the whole tick.
    pub async fn run_once(&self) -> EngineResult<TickReport> {
        let now = self.service.now();
        let config = self.service.config();
        let session_cutoff = now - config.session_ttl();
        let grace_cutoff = now - config.auto_confirm_grace();

        let candidates = self
            .service
            .database()
            .bookings()
            .auto_confirm_candidates(session_cutoff, grace_cutoff, self.settings.batch_size)
            .await?;

        let mut report = TickReport {
            selected: candidates.len(),
            ..TickReport::default()
        };

        for booking in &candidates {
            match self.service.auto_confirm(&booking.id).await {
                Ok(Some(_)) => report.confirmed += 1,
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    warn!(booking_id = %booking.id, error = %e, "Auto-confirm failed");
                    report.failed += 1;
                }
            }
        }

        match self.service.sessions().purge_expired().await {
            Ok(purged) => report.purged_sessions = purged,
            Err(e) => warn!(error = %e, "Failed to purge expired payment sessions"),
        }

        Ok(report)
    }
}
