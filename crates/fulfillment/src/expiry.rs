//! Background worker that expires orders left unpaid past their deadline.

use std::sync::Arc;
use std::time::Duration;

use common::Clock;
use domain::{DomainError, ExpireOrder, OrderError, OrderService};
use event_store::EventStore;
use tokio::sync::watch;

use crate::availability::Availability;
use crate::error::Result;

pub struct ExpiryWorker<S: EventStore> {
    orders: OrderService<S>,
    availability: Availability<S>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl<S: EventStore + Clone> ExpiryWorker<S> {
    /// Returns the worker and a sender that stops it. Send `true` to shut
    /// down after the current sweep.
    pub fn new(
        store: S,
        availability: Availability<S>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = Self {
            orders: OrderService::new(store),
            availability,
            clock,
            interval,
            shutdown: shutdown_rx,
        };
        (worker, shutdown_tx)
    }
}

impl<S: EventStore> ExpiryWorker<S> {
    /// Expires every overdue order the pending view knows about and returns
    /// how many were expired.
    ///
    /// Orders that were paid or closed since the view last caught up are
    /// skipped; the next refresh drops them from the view.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self) -> Result<usize> {
        self.availability.refresh().await?;
        let now = self.clock.now();
        let overdue = self.availability.pending().overdue(now).await;

        let mut expired = 0;
        for order_id in overdue {
            match self.orders.expire_order(ExpireOrder { order_id, now }).await {
                Ok(_) => expired += 1,
                Err(e) if e.is_conflict() => {
                    tracing::debug!(%order_id, "order changed during sweep, skipping");
                }
                Err(DomainError::Order(
                    OrderError::InvalidStateTransition { .. } | OrderError::NotYetExpired { .. },
                )) => {
                    tracing::debug!(%order_id, "order no longer expirable, skipping");
                }
                Err(e) => {
                    tracing::warn!(%order_id, error = %e, "failed to expire order");
                }
            }
        }

        if expired > 0 {
            tracing::info!(expired, "expired overdue orders");
        }
        Ok(expired)
    }

    /// Sweeps on every tick until shutdown is signalled.
    pub async fn run(mut self) {
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "expiry worker started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        tracing::error!(error = %e, "expiry sweep failed");
                    }
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("expiry worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use common::{AggregateId, ManualClock};
    use domain::{
        Buyer, CommandContext, ConfirmPayment, Currency, Money, OrderLine, OrderState, PlaceOrder,
    };
    use event_store::InMemoryEventStore;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
    }

    struct Fixture {
        orders: OrderService<InMemoryEventStore>,
        clock: ManualClock,
        worker: ExpiryWorker<InMemoryEventStore>,
        shutdown: watch::Sender<bool>,
    }

    fn fixture() -> Fixture {
        let store = InMemoryEventStore::new();
        let clock = ManualClock::new(t0());
        let (worker, shutdown) = ExpiryWorker::new(
            store.clone(),
            Availability::new(store.clone()),
            Arc::new(clock.clone()),
            Duration::from_millis(10),
        );
        Fixture {
            orders: OrderService::new(store),
            clock,
            worker,
            shutdown,
        }
    }

    async fn place(f: &Fixture, ttl_minutes: i64) -> AggregateId {
        let order_id = AggregateId::new();
        f.orders
            .place_order(PlaceOrder {
                order_id,
                buyer: Buyer::new("Ada Lovelace", "ada@example.com"),
                lines: vec![OrderLine::new(
                    "general",
                    "General Admission",
                    1,
                    Money::from_cents(5000),
                )],
                currency: Currency::default(),
                placed_at: t0(),
                expires_at: t0() + chrono::Duration::minutes(ttl_minutes),
            })
            .await
            .unwrap();
        order_id
    }

    #[tokio::test]
    async fn sweep_expires_only_overdue_orders() {
        let f = fixture();
        let short = place(&f, 5).await;
        let long = place(&f, 30).await;

        assert_eq!(f.worker.sweep().await.unwrap(), 0);

        f.clock.advance(chrono::Duration::minutes(10));
        assert_eq!(f.worker.sweep().await.unwrap(), 1);

        assert_eq!(
            f.orders.require_order(short).await.unwrap().state(),
            OrderState::Expired
        );
        assert_eq!(
            f.orders.require_order(long).await.unwrap().state(),
            OrderState::PendingPayment
        );

        // Expired orders leave the view.
        assert_eq!(f.worker.sweep().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn paid_orders_are_never_expired() {
        let f = fixture();
        let order_id = place(&f, 5).await;
        f.orders
            .confirm_payment(
                ConfirmPayment {
                    order_id,
                    reference: "cs_0001".to_string(),
                    amount: Money::from_cents(5000),
                    currency: Currency::default(),
                    paid_at: t0() + chrono::Duration::minutes(1),
                },
                CommandContext::new(),
            )
            .await
            .unwrap();

        f.clock.advance(chrono::Duration::hours(1));
        assert_eq!(f.worker.sweep().await.unwrap(), 0);
        assert_eq!(
            f.orders.require_order(order_id).await.unwrap().state(),
            OrderState::Paid
        );
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let f = fixture();
        let order_id = place(&f, 5).await;
        f.clock.advance(chrono::Duration::minutes(6));

        let orders = f.orders;
        let handle = tokio::spawn(f.worker.run());

        // The first tick fires immediately.
        let mut state = OrderState::PendingPayment;
        for _ in 0..100 {
            state = orders.require_order(order_id).await.unwrap().state();
            if state == OrderState::Expired {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(state, OrderState::Expired);

        f.shutdown.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
