//! Integration tests: domain services → event store → ProjectionProcessor → views.

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::AggregateId;
use domain::{
    AccessCode, AccessCodeSigner, CodeKind, Buyer, CheckInService, CommandContext, ConfirmPayment, Currency,
    ExpireOrder, IssueTickets, Money, OrderLine, OrderService, ParticipantKind,
    ParticipantService, PlaceOrder, RegisterParticipant, TicketIssuedData, TicketService,
    TicketTypeId,
};
use event_store::InMemoryEventStore;
use projections::{PendingOrdersView, ProjectionProcessor, TicketSalesView};

struct Harness {
    store: InMemoryEventStore,
    orders: OrderService<InMemoryEventStore>,
    processor: ProjectionProcessor<InMemoryEventStore>,
    pending: PendingOrdersView,
    sales: TicketSalesView,
}

fn setup() -> Harness {
    let store = InMemoryEventStore::new();
    let pending = PendingOrdersView::new();
    let sales = TicketSalesView::new();

    let mut processor = ProjectionProcessor::new(store.clone());
    processor.register(Box::new(pending.clone()));
    processor.register(Box::new(sales.clone()));

    Harness {
        orders: OrderService::new(store.clone()),
        store,
        processor,
        pending,
        sales,
    }
}

fn signer() -> AccessCodeSigner {
    AccessCodeSigner::new("projection-test-secret").unwrap()
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 1, 10, 0, 0).unwrap()
}

async fn place(h: &Harness, general: u32) -> AggregateId {
    let order_id = AggregateId::new();
    h.orders
        .place_order(PlaceOrder {
            order_id,
            buyer: Buyer::new("Ada Lovelace", "ada@example.com"),
            lines: vec![OrderLine::new(
                "general",
                "General Admission",
                general,
                Money::from_cents(19900),
            )],
            currency: Currency::default(),
            placed_at: t0(),
            expires_at: t0() + Duration::minutes(15),
        })
        .await
        .unwrap();
    order_id
}

async fn pay_and_issue(h: &Harness, order_id: AggregateId) {
    let order = h.orders.require_order(order_id).await.unwrap();
    let result = h
        .orders
        .confirm_payment(
            ConfirmPayment {
                order_id,
                reference: "cs_0001".to_string(),
                amount: order.total(),
                currency: Currency::default(),
                paid_at: t0() + Duration::minutes(1),
            },
            CommandContext::new(),
        )
        .await
        .unwrap();

    let tickets = TicketService::new(h.store.clone());
    let mut ids = Vec::new();
    for planned in result.aggregate.planned_tickets() {
        tickets
            .issue_ticket(TicketIssuedData {
                ticket_id: planned.ticket_id,
                order_id,
                ticket_type_id: planned.ticket_type_id,
                ticket_type_name: planned.ticket_type_name,
                holder_name: "Ada Lovelace".to_string(),
                holder_email: "ada@example.com".to_string(),
                code: signer().sign(AccessCode::new(CodeKind::Ticket, planned.ticket_id)),
                issued_at: t0() + Duration::minutes(1),
            })
            .await
            .unwrap();
        ids.push(planned.ticket_id);
    }
    h.orders
        .issue_tickets(IssueTickets {
            order_id,
            ticket_ids: ids,
            issued_at: t0() + Duration::minutes(1),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_capacity_moves_from_held_to_sold() {
    let h = setup();
    let general = TicketTypeId::from("general");

    let order_id = place(&h, 3).await;
    h.processor.run_catch_up().await.unwrap();
    assert_eq!(h.pending.held_quantity(&general, t0()).await, 3);
    assert_eq!(h.sales.sold(&general).await, 0);

    pay_and_issue(&h, order_id).await;
    h.processor.run_catch_up().await.unwrap();
    assert_eq!(h.pending.held_quantity(&general, t0()).await, 0);
    assert_eq!(h.sales.sold(&general).await, 3);

    let snapshot = h.sales.snapshot().await;
    assert_eq!(snapshot.orders_paid, 1);
    assert_eq!(snapshot.revenue, Money::from_cents(3 * 19900));
}

#[tokio::test]
async fn test_overdue_orders_feed_expiry() {
    let h = setup();
    let stale = place(&h, 1).await;
    h.processor.run_catch_up().await.unwrap();

    let later = t0() + Duration::minutes(16);
    assert_eq!(h.pending.overdue(later).await, vec![stale]);

    h.orders
        .expire_order(ExpireOrder {
            order_id: stale,
            now: later,
        })
        .await
        .unwrap();
    h.processor.run_catch_up().await.unwrap();

    assert!(h.pending.overdue(later).await.is_empty());
    assert_eq!(h.pending.count().await, 0);
}

#[tokio::test]
async fn test_check_ins_counted_for_tickets_and_badges() {
    let h = setup();
    let signer = signer();

    let order_id = place(&h, 1).await;
    pay_and_issue(&h, order_id).await;

    let order = h.orders.require_order(order_id).await.unwrap();
    let ticket = TicketService::new(h.store.clone())
        .get_ticket(order.ticket_ids()[0])
        .await
        .unwrap()
        .unwrap();

    let speaker = ParticipantService::new(h.store.clone(), signer.clone())
        .register(RegisterParticipant {
            participant_id: AggregateId::new(),
            kind: ParticipantKind::Speaker,
            name: "Grace Hopper".to_string(),
            organization: None,
            email: None,
            registered_at: t0(),
        })
        .await
        .unwrap();

    let checkin = CheckInService::new(h.store.clone(), signer);
    checkin.check_in(ticket.code(), None, t0()).await.unwrap();
    checkin
        .check_in(speaker.aggregate.code(), None, t0())
        .await
        .unwrap();

    h.processor.run_catch_up().await.unwrap();
    let general = h.sales.ticket_type(&TicketTypeId::from("general")).await;
    assert_eq!(general.issued, 1);
    assert_eq!(general.checked_in, 1);

    let speakers = h.sales.participants(ParticipantKind::Speaker).await;
    assert_eq!(speakers.registered, 1);
    assert_eq!(speakers.checked_in, 1);
}

#[tokio::test]
async fn test_rebuild_matches_incremental_catch_up() {
    let h = setup();
    let paid = place(&h, 2).await;
    place(&h, 1).await;
    pay_and_issue(&h, paid).await;

    h.processor.run_catch_up().await.unwrap();
    let before = h.sales.snapshot().await;
    let held_before = h.pending.held_by_type(t0()).await;

    h.processor.rebuild_all().await.unwrap();
    assert_eq!(h.sales.snapshot().await, before);
    assert_eq!(h.pending.held_by_type(t0()).await, held_before);
}
