//! Waiting on ConnMan state transitions.
//!
//! Workflows subscribe to notifications BEFORE issuing the call whose
//! effect they wait for, then hand the subscription to one of these
//! functions. Nothing here polls.
//!
//! - [`wait_for_join`] follows a service's own `PropertyChanged` stream
//!   until it connects or fails.
//! - [`wait_for_events`] follows the registry's event channel until a
//!   predicate has seen what it needs, bounded by a timeout.

use futures::{FutureExt, StreamExt, select};
use log::{debug, warn};
use std::pin::pin;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::Result;
use crate::api::models::{ConnmanError, Event, PropertyValue, ServiceState};
use crate::transport::PropertyStream;

/// Waits for a joining service to reach `ready`/`online` or `failure`.
///
/// `changes` must be the service's own property stream, subscribed before
/// `Connect` was called. There is no timeout: ConnMan always ends a
/// connection attempt in one of the two states. On failure the last
/// `Error` property seen on the stream is returned as the reason.
pub(crate) async fn wait_for_join(ssid: &str, changes: &mut PropertyStream) -> Result<()> {
    let mut reason = None;

    while let Some((name, value)) = changes.next().await {
        match (name.as_str(), &value) {
            ("Error", PropertyValue::Str(error)) if !error.is_empty() => {
                debug!("Service '{ssid}' reported error: {error}");
                reason = Some(error.clone());
            }
            ("State", PropertyValue::Str(state)) => {
                let state = ServiceState::from(state.as_str());
                debug!("Service '{ssid}' state changed to: {state}");
                if state.is_connected() {
                    return Ok(());
                }
                if state == ServiceState::Failure {
                    return Err(ConnmanError::JoinFailed {
                        ssid: ssid.to_owned(),
                        reason,
                    });
                }
            }
            _ => {}
        }
    }

    Err(ConnmanError::Stuck(format!(
        "property stream of '{ssid}' ended while joining"
    )))
}

/// Waits until `done` returns true for a received event.
///
/// Lagged receivers skip ahead silently. Returns `Timeout(what)` when
/// `timeout` elapses first and `Stuck` when the channel closes.
pub(crate) async fn wait_for_events<F>(
    rx: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    what: &'static str,
    mut done: F,
) -> Result<()>
where
    F: FnMut(&Event) -> bool,
{
    let mut timeout_delay = pin!(tokio::time::sleep(timeout).fuse());

    loop {
        let mut recv = pin!(rx.recv().fuse());
        select! {
            _ = timeout_delay => {
                debug!("Timed out after {timeout:?} waiting for {what}");
                return Err(ConnmanError::Timeout(what));
            }
            received = recv => match received {
                Ok(event) => {
                    if done(&event) {
                        return Ok(());
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event receiver lagged, skipped {skipped} events waiting for {what}");
                }
                Err(RecvError::Closed) => {
                    return Err(ConnmanError::Stuck(format!(
                        "event channel closed waiting for {what}"
                    )));
                }
            }
        }
    }
}

/// Predicate counting `ServicesChanged` events up to `count`.
pub(crate) fn services_changed_times(count: usize) -> impl FnMut(&Event) -> bool {
    let mut seen = 0;
    move |event| {
        if matches!(event, Event::ServicesChanged(_)) {
            seen += 1;
            debug!("ServicesChanged {seen}/{count}");
        }
        seen >= count
    }
}

/// Predicate waiting for both a `ServicesChanged` and `tethering = false`.
///
/// `already_off` seeds the tethering half: repeated values are never
/// republished, so a cached `false` would otherwise never be seen.
pub(crate) fn hotspot_closed(already_off: bool) -> impl FnMut(&Event) -> bool {
    let mut services_changed = false;
    let mut tethering_off = already_off;
    move |event| {
        match event {
            Event::ServicesChanged(_) => services_changed = true,
            Event::PropertyChanged { name, value } if name == "tethering" => {
                tethering_off = value.as_bool() == Some(false);
            }
            _ => {}
        }
        services_changed && tethering_off
    }
}
