use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use crate::models::overview::OverviewSnapshot;

use super::aggregator::Aggregator;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverviewEvent {
    Snapshot(Box<OverviewSnapshot>),
    /// Terminal: nothing follows an error on the same subscription.
    Error(String),
}

/// Re-runs the aggregation on a fixed period for each subscriber.
pub struct Broadcaster {
    aggregator: Arc<Aggregator>,
    interval: Duration,
}

impl Broadcaster {
    pub fn new(aggregator: Arc<Aggregator>, interval: Duration) -> Self {
        Self {
            aggregator,
            interval,
        }
    }

    /// Spawns a dedicated ticker for one subscriber. The first snapshot is
    /// produced one full interval after subscribing. Dropping the returned
    /// stream stops the ticker, including any aggregation in flight.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(1);
        let token = CancellationToken::new();

        tokio::spawn(run(
            self.aggregator.clone(),
            self.interval,
            tx,
            token.clone(),
        ));

        Subscription {
            events: ReceiverStream::new(rx),
            _cancel_on_drop: token.drop_guard(),
        }
    }
}

pub struct Subscription {
    events: ReceiverStream<OverviewEvent>,
    _cancel_on_drop: DropGuard,
}

impl Stream for Subscription {
    type Item = OverviewEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

async fn run(
    aggregator: Arc<Aggregator>,
    period: Duration,
    tx: mpsc::Sender<OverviewEvent>,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // The channel holds a single event, so a permit is only available once
        // the subscriber has taken the previous one. No work starts before that.
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            p = tx.reserve() => match p {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            r = aggregator.snapshot() => r,
        };

        match result {
            Ok(snapshot) => permit.send(OverviewEvent::Snapshot(Box::new(snapshot))),
            Err(e) => {
                warn!("overview stream aborted: {}", e);
                permit.send(OverviewEvent::Error(e.to_string()));
                break;
            }
        }
    }

    debug!("overview stream ticker stopped");
}
