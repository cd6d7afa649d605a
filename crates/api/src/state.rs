//! Shared application state.

use std::sync::Arc;

use common::Clock;
use domain::{
    AccessCodeSigner, Catalog, CheckInService, InMemoryCatalog, OrderService, ParticipantService,
    TicketService,
};
use event_store::EventStore;
use fulfillment::{
    Availability, CheckoutService, CheckoutSettings, FulfillmentService, PaymentGateway,
    WebhookVerifier,
};

use crate::config::Config;
use crate::error::StartupError;

/// Event store behind the API, chosen at startup.
pub type Store = Arc<dyn EventStore>;

/// Payment gateway behind the API, chosen at startup.
pub type Gateway = Arc<dyn PaymentGateway>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub store: Store,
    pub catalog: Arc<dyn Catalog>,
    pub clock: Arc<dyn Clock>,
    pub availability: Availability<Store>,
    pub orders: OrderService<Store>,
    pub tickets: TicketService<Store>,
    pub participants: ParticipantService<Store>,
    pub checkout: CheckoutService<Store, Gateway>,
    pub fulfillment: FulfillmentService<Store, Gateway>,
    pub check_in: CheckInService<Store>,
    pub verifier: WebhookVerifier,
}

impl AppState {
    /// Wires every service to `store` and `gateway` using the secrets and
    /// limits in `config`. Loads the catalog from `CATALOG_PATH` when set.
    pub fn new(
        config: &Config,
        store: Store,
        gateway: Gateway,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StartupError> {
        let catalog = match &config.catalog_path {
            Some(path) => InMemoryCatalog::load(path)?,
            None => InMemoryCatalog::conference_defaults(),
        };
        let signer = AccessCodeSigner::new(&config.access_code_secret)?;
        let verifier = WebhookVerifier::new(&config.webhook_secret, config.webhook_tolerance)?;
        let availability = Availability::new(Arc::clone(&store));
        let catalog: Arc<dyn Catalog> = Arc::new(catalog);

        let settings = CheckoutSettings {
            currency: config.currency.clone(),
            order_ttl: config.order_ttl,
            max_tickets_per_order: config.max_tickets_per_order,
        };

        Ok(Self {
            orders: OrderService::new(Arc::clone(&store)),
            tickets: TicketService::new(Arc::clone(&store)),
            participants: ParticipantService::new(Arc::clone(&store), signer.clone()),
            checkout: CheckoutService::new(
                Arc::clone(&store),
                Arc::clone(&catalog),
                Arc::clone(&gateway),
                availability.clone(),
                signer.clone(),
                Arc::clone(&clock),
                settings,
            ),
            fulfillment: FulfillmentService::new(Arc::clone(&store), gateway, signer.clone()),
            check_in: CheckInService::new(Arc::clone(&store), signer),
            availability,
            catalog,
            clock,
            verifier,
            store,
        })
    }
}
