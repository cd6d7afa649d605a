//! Turning a cart into a placed order and a hosted checkout session.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::{AggregateId, Clock};
use domain::{
    AccessCodeSigner, Aggregate, Buyer, CancelOrder, Catalog, CommandContext, ConfirmPayment,
    Currency, DomainError, Money, Order, OrderError, OrderLine, OrderService, PlaceOrder,
    RecordPaymentInitiation, TicketType, TicketTypeId,
};
use event_store::EventStore;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::availability::Availability;
use crate::error::{FulfillmentError, Result};
use crate::gateway::{CheckoutRequest, PaymentGateway};
use crate::issuance::TicketIssuer;

/// Reference recorded for orders that cost nothing.
pub const FREE_REFERENCE: &str = "free";

pub const GATEWAY_UNAVAILABLE_REASON: &str = "payment gateway unavailable";

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub currency: Currency,

    /// How long a placed order waits for payment.
    pub order_ttl: Duration,

    /// Cap on tickets across all lines of one order.
    pub max_tickets_per_order: u32,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            currency: Currency::default(),
            order_ttl: Duration::minutes(15),
            max_tickets_per_order: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CartItem {
    pub ticket_type_id: TicketTypeId,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    pub buyer: Buyer,
    pub items: Vec<CartItem>,
}

#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub order: Order,

    /// Where to send the buyer. `None` for free orders, which are fulfilled
    /// on the spot.
    pub checkout_url: Option<String>,
}

pub struct CheckoutService<S: EventStore, G: PaymentGateway> {
    orders: OrderService<S>,
    issuer: TicketIssuer<S>,
    catalog: Arc<dyn Catalog>,
    gateway: G,
    availability: Availability<S>,
    clock: Arc<dyn Clock>,
    settings: CheckoutSettings,

    /// Serializes the capacity check with the placement it admits.
    admission: Mutex<()>,
}

impl<S: EventStore + Clone, G: PaymentGateway> CheckoutService<S, G> {
    pub fn new(
        store: S,
        catalog: Arc<dyn Catalog>,
        gateway: G,
        availability: Availability<S>,
        signer: AccessCodeSigner,
        clock: Arc<dyn Clock>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            orders: OrderService::new(store.clone()),
            issuer: TicketIssuer::new(store, signer),
            catalog,
            gateway,
            availability,
            clock,
            settings,
            admission: Mutex::new(()),
        }
    }
}

impl<S: EventStore, G: PaymentGateway> CheckoutService<S, G> {
    /// Prices the cart, checks capacity, places the order and opens a
    /// checkout session for it.
    #[tracing::instrument(skip(self, cart), fields(items = cart.items.len()))]
    pub async fn checkout(&self, cart: Cart) -> Result<CheckoutReceipt> {
        let priced = self.price(&cart.items)?;
        let now = self.clock.now();
        let order_id = AggregateId::new();

        let order = {
            let _admission = self.admission.lock().await;
            self.availability.refresh().await?;
            self.check_capacity(&priced, now).await?;

            self.orders
                .place_order(PlaceOrder {
                    order_id,
                    buyer: cart.buyer,
                    lines: priced.iter().map(|(_, line)| line.clone()).collect(),
                    currency: self.settings.currency.clone(),
                    placed_at: now,
                    expires_at: now + self.settings.order_ttl,
                })
                .await?
                .aggregate
        };

        if order.total().is_zero() {
            return self.fulfill_free(order).await;
        }

        let request = CheckoutRequest {
            order_id,
            amount: order.total(),
            currency: order.currency().clone(),
            description: describe(order.lines()),
            customer_email: order.buyer().map(|b| b.email.clone()).unwrap_or_default(),
            expires_at: order.expires_at(),
        };

        let session = match self.gateway.create_checkout(request).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(%order_id, error = %e, "checkout session failed, cancelling order");
                metrics::counter!("checkout_gateway_failures_total").increment(1);
                self.orders
                    .cancel_order(CancelOrder {
                        order_id,
                        reason: GATEWAY_UNAVAILABLE_REASON.to_string(),
                        cancelled_at: self.clock.now(),
                    })
                    .await?;
                return Err(FulfillmentError::GatewayUnavailable(e));
            }
        };

        let result = self
            .orders
            .record_payment_initiation(RecordPaymentInitiation {
                order_id,
                gateway_reference: session.reference,
                checkout_url: session.redirect_url.clone(),
            })
            .await?;

        Ok(CheckoutReceipt {
            order: result.aggregate,
            checkout_url: Some(session.redirect_url),
        })
    }

    fn price(&self, items: &[CartItem]) -> Result<Vec<(TicketType, OrderLine)>> {
        let mut priced: Vec<(TicketType, OrderLine)> = Vec::with_capacity(items.len());

        for item in items {
            if item.quantity == 0 {
                return Err(DomainError::Order(OrderError::InvalidQuantity {
                    ticket_type_id: item.ticket_type_id.clone(),
                    quantity: 0,
                })
                .into());
            }

            if let Some((_, line)) = priced
                .iter_mut()
                .find(|(tt, _)| tt.id == item.ticket_type_id)
            {
                line.quantity = line.quantity.checked_add(item.quantity).ok_or(
                    FulfillmentError::QuantityLimit {
                        requested: u32::MAX,
                        limit: self.settings.max_tickets_per_order,
                    },
                )?;
                continue;
            }

            let ticket_type = self
                .catalog
                .get(&item.ticket_type_id)
                .ok_or_else(|| FulfillmentError::UnknownTicketType(item.ticket_type_id.clone()))?;
            if !ticket_type.on_sale {
                return Err(FulfillmentError::NotOnSale(ticket_type.id));
            }
            let line = OrderLine::new(
                ticket_type.id.clone(),
                ticket_type.name.clone(),
                item.quantity,
                ticket_type.price,
            );
            priced.push((ticket_type, line));
        }

        for (ticket_type, line) in &priced {
            if line.quantity > ticket_type.max_per_order {
                return Err(FulfillmentError::QuantityLimit {
                    requested: line.quantity,
                    limit: ticket_type.max_per_order,
                });
            }
        }

        let requested = priced
            .iter()
            .try_fold(0u32, |total, (_, line)| total.checked_add(line.quantity))
            .unwrap_or(u32::MAX);
        if requested > self.settings.max_tickets_per_order {
            return Err(FulfillmentError::QuantityLimit {
                requested,
                limit: self.settings.max_tickets_per_order,
            });
        }

        Ok(priced)
    }

    async fn check_capacity(
        &self,
        priced: &[(TicketType, OrderLine)],
        now: DateTime<Utc>,
    ) -> Result<()> {
        for (ticket_type, line) in priced {
            if let Some(remaining) = self.availability.remaining(ticket_type, now).await
                && line.quantity > remaining
            {
                return Err(FulfillmentError::SoldOut {
                    ticket_type_id: ticket_type.id.clone(),
                    remaining,
                    requested: line.quantity,
                });
            }
        }
        Ok(())
    }

    async fn fulfill_free(&self, order: Order) -> Result<CheckoutReceipt> {
        let Some(order_id) = order.id() else {
            return Ok(CheckoutReceipt {
                order,
                checkout_url: None,
            });
        };
        let now = self.clock.now();

        let confirmed = self
            .orders
            .confirm_payment(
                ConfirmPayment {
                    order_id,
                    reference: FREE_REFERENCE.to_string(),
                    amount: Money::zero(),
                    currency: order.currency().clone(),
                    paid_at: now,
                },
                CommandContext::new().correlation_id(format!("checkout:{order_id}")),
            )
            .await?;
        self.issuer.issue(&confirmed.aggregate, now).await?;

        Ok(CheckoutReceipt {
            order: self.orders.require_order(order_id).await?,
            checkout_url: None,
        })
    }
}

fn describe(lines: &[OrderLine]) -> String {
    lines
        .iter()
        .map(|line| format!("{} x {}", line.quantity, line.ticket_type_name))
        .collect::<Vec<_>>()
        .join(", ")
}
