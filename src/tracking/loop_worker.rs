use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{sampler::Sampler, status::StatusObserver};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Recurring sample+report loop for one tracking session.
///
/// The first tick fires immediately. Each tick runs to completion before the
/// next is considered; a slow tick delays the schedule instead of bursting.
/// Cancellation drops an in-flight tick, so nothing is sent after the token
/// fires and the task has been awaited.
pub async fn tracking_loop(
    session_id: String,
    user_id: String,
    interval: Duration,
    sampler: Sampler,
    status: StatusObserver,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!(
        "tracking loop {} started for {} every {}ms",
        session_id,
        user_id,
        interval.as_millis()
    );

    let mut ticks: u64 = 0;
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                if !status.current().is_active {
                    log_debug!("tracking loop {} skipping tick: session not active", session_id);
                    continue;
                }

                ticks = ticks.wrapping_add(1);
                tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => break,
                    sent = sampler.tick(&user_id) => {
                        log_debug!("tracking loop {} tick {} sent={}", session_id, ticks, sent);
                    }
                }
            }
        }
    }

    log_info!("tracking loop {} shutting down after {} ticks", session_id, ticks);
}
