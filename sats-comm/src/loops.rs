// Sats Comm - Satellite communication daemon
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Outbound and inbound loops
//!
//! Each iteration is blocking modem work and runs on the blocking pool.
//! Errors end the iteration, never the loop.

use crate::telemetry::TelemetrySource;
use sats_link::{
    Actuator, DispatchOutcome, Dispatcher, DrainReport, LinkError, Message, TransferSession,
    Transport, TransportError,
};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Sample, queue, drain, then beat the heart
///
/// The heartbeat is only recorded when the drain reached the modem.
pub fn outbound_iteration<T, S>(
    session: &TransferSession<T>,
    source: &S,
) -> Result<DrainReport, LinkError>
where
    T: Transport,
    S: TelemetrySource + ?Sized,
{
    info!("Gathering data from payloads");
    let telemetry = source.sample();
    let id = session.enqueue_message(&Message::Global(telemetry))?;
    debug!("Stored telemetry as envelope {}", id);

    info!("Trying to send gathered data through satellites");
    let report = session.drain()?;
    session.beat();
    Ok(report)
}

/// Poll for one inbound frame and dispatch it
pub fn inbound_iteration<T, A>(
    session: &TransferSession<T>,
    dispatcher: &Dispatcher<A>,
) -> Result<Option<DispatchOutcome>, TransportError>
where
    T: Transport,
    A: Actuator,
{
    info!("Checking for incoming messages from the satellites");
    Ok(session
        .poll()?
        .map(|frame| dispatcher.handle(session, &frame)))
}

/// Run the outbound loop forever
pub async fn run_outbound<T, S>(session: Arc<TransferSession<T>>, source: Arc<S>)
where
    T: Transport + Send + 'static,
    S: TelemetrySource + Send + Sync + ?Sized + 'static,
{
    loop {
        let (s, src) = (Arc::clone(&session), Arc::clone(&source));
        match tokio::task::spawn_blocking(move || outbound_iteration(&*s, &*src)).await {
            Ok(Ok(report)) => info!(
                "Drain finished: {} delivered, {} left queued, {} session(s)",
                report.delivered.len(),
                report.exhausted.len(),
                report.attempts
            ),
            Ok(Err(e)) => error!("Outbound iteration failed: {}", e),
            Err(e) => error!("Outbound iteration panicked: {}", e),
        }

        let rest = session.rest_intervals().output;
        info!(
            "Resting for {} seconds before next data transmission",
            rest.as_secs()
        );
        tokio::time::sleep(rest).await;
    }
}

/// Run the inbound loop forever
pub async fn run_inbound<T, A>(session: Arc<TransferSession<T>>, dispatcher: Arc<Dispatcher<A>>)
where
    T: Transport + Send + 'static,
    A: Actuator + Send + Sync + 'static,
{
    loop {
        let (s, d) = (Arc::clone(&session), Arc::clone(&dispatcher));
        match tokio::task::spawn_blocking(move || inbound_iteration(&*s, &*d)).await {
            Ok(Ok(Some(outcome))) => info!(
                "Handled {:?}: {}",
                outcome.text,
                if outcome.is_success() { "ok" } else { "failed" }
            ),
            Ok(Ok(None)) => {}
            Ok(Err(e)) => error!("Inbound iteration failed: {}", e),
            Err(e) => error!("Inbound iteration panicked: {}", e),
        }

        let rest = session.rest_intervals().input;
        debug!(
            "Resting for {} seconds before checking for new incoming messages",
            rest.as_secs()
        );
        tokio::time::sleep(rest).await;
    }
}
