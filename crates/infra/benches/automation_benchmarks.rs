use std::sync::Arc;

use chrono::Utc;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use partsupply_core::{AggregateId, PartId, SupplierId, UserId};
use partsupply_events::{EventEnvelope, InMemoryEventBus};
use partsupply_infra::automation::{AutomationCoordinator, IntakeLine, NewInventoryItem, OrderIntake};
use partsupply_infra::clock::SystemClock;
use partsupply_infra::command_dispatcher::CommandDispatcher;
use partsupply_infra::config::AutomationConfig;
use partsupply_infra::event_store::InMemoryEventStore;
use partsupply_infra::external::{InMemoryCatalog, StaticCompetitorFeed};
use partsupply_infra::streams;
use partsupply_inventory::{
    AddItem, InventoryCommand, InventoryItem, InventoryItemId, ItemCondition, ItemSettings,
    ReleaseReservation, ReserveStock,
};
use partsupply_pricing::{
    Markup, PriceBounds, PricingInput, PricingRuleId, RuleDefinition, RuleMatch, RuleSnapshot,
    derive_price,
};
use partsupply_suppliers::{BusinessType, SubscriptionTier, SupplierProfile};

type Dispatcher = CommandDispatcher<InMemoryEventStore, Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>>;

fn settings() -> ItemSettings {
    ItemSettings {
        reorder_point: 0,
        reorder_quantity: 0,
        auto_reorder_enabled: false,
        cost_price: 10_000,
        markup_bps: 2_500,
        condition: ItemCondition::New,
        warranty_months: 0,
        location: None,
    }
}

fn make_item(_: SupplierId, id: AggregateId) -> InventoryItem {
    InventoryItem::empty(InventoryItemId::new(id))
}

fn setup_item(quantity: i64) -> (Dispatcher, SupplierId, InventoryItemId) {
    let dispatcher = CommandDispatcher::new(InMemoryEventStore::new(), Arc::new(InMemoryEventBus::new()));
    let supplier_id = SupplierId::new();
    let item_id = InventoryItemId::new(AggregateId::new());
    let add = InventoryCommand::AddItem(AddItem {
        supplier_id,
        item_id,
        part_id: PartId::new(),
        sku: "BENCH-1".to_string(),
        initial_quantity: quantity,
        settings: settings(),
        occurred_at: Utc::now(),
    });
    dispatcher
        .dispatch(supplier_id, item_id.0, streams::INVENTORY_ITEM, &add, make_item)
        .unwrap();
    (dispatcher, supplier_id, item_id)
}

fn rules(count: usize) -> Vec<RuleSnapshot> {
    let supplier_id = SupplierId::new();
    (0..count)
        .map(|i| RuleSnapshot {
            rule_id: PricingRuleId::new(AggregateId::new()),
            supplier_id,
            definition: RuleDefinition {
                matcher: if i + 1 == count {
                    RuleMatch::Category {
                        category: "brakes".to_string(),
                    }
                } else {
                    RuleMatch::Brand {
                        brand: format!("brand-{i}"),
                    }
                },
                markup: Markup::Percentage { bps: 1_500 },
                bounds: PriceBounds {
                    min_price: Some(5_000),
                    max_price: Some(50_000),
                },
                priority: i as u32,
            },
            is_active: true,
        })
        .collect()
}

fn bench_price_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("price_derivation");
    let input = PricingInput {
        part_id: PartId::new(),
        category: Some("Brakes".to_string()),
        brand: Some("Bosch".to_string()),
        cost_price: 10_000,
        markup_bps: 2_500,
    };
    let competitors: Vec<u64> = (0..16).map(|i| 9_000 + i * 100).collect();

    for rule_count in [1usize, 10, 100].iter() {
        let rules = rules(*rule_count);
        group.throughput(Throughput::Elements(*rule_count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rule_count), &rules, |b, rules| {
            b.iter(|| derive_price(black_box(&input), black_box(rules), black_box(&competitors)));
        });
    }
    group.finish();
}

fn bench_reservation_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("reservation_latency");
    group.sample_size(500);

    // Every iteration reserves and releases one unit, so the stream keeps growing.
    group.bench_function("reserve_release_with_history", |b| {
        let (dispatcher, supplier_id, item_id) = setup_item(1_000);
        let order_id = AggregateId::new();
        b.iter(|| {
            let reserve = InventoryCommand::ReserveStock(ReserveStock {
                supplier_id,
                item_id,
                order_id,
                quantity: black_box(1),
                occurred_at: Utc::now(),
            });
            dispatcher
                .dispatch(supplier_id, item_id.0, streams::INVENTORY_ITEM, &reserve, make_item)
                .unwrap();
            let release = InventoryCommand::ReleaseReservation(ReleaseReservation {
                supplier_id,
                item_id,
                order_id,
                quantity: 1,
                occurred_at: Utc::now(),
            });
            dispatcher
                .dispatch(supplier_id, item_id.0, streams::INVENTORY_ITEM, &release, make_item)
                .unwrap();
        });
    });
    group.finish();
}

fn bench_order_placement(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_placement");
    group.sample_size(100);

    group.bench_function("place_single_line_order", |b| {
        let coordinator = AutomationCoordinator::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemoryEventBus::new()),
            Arc::new(InMemoryCatalog::new()),
            Arc::new(StaticCompetitorFeed::new()),
            Arc::new(SystemClock),
            AutomationConfig::default(),
        )
        .unwrap();
        let supplier_id = coordinator
            .onboard_supplier(
                UserId::new(),
                SupplierProfile {
                    business_name: "Bench Parts".to_string(),
                    business_type: BusinessType::Retailer,
                    tax_id: None,
                    certifications: vec![],
                    contact_email: None,
                },
                SubscriptionTier::Basic,
            )
            .unwrap();
        let part_id = PartId::new();
        coordinator
            .add_inventory_item(
                supplier_id,
                NewInventoryItem {
                    part_id,
                    sku: "BENCH-ORD".to_string(),
                    initial_quantity: 1_000_000,
                    settings: settings(),
                },
            )
            .unwrap();

        b.iter(|| {
            coordinator
                .place_order(OrderIntake {
                    buyer_id: UserId::new(),
                    order_ref: "BENCH".to_string(),
                    lines: vec![IntakeLine {
                        seller_id: supplier_id,
                        part_id,
                        quantity: black_box(1),
                        unit_price: 12_500,
                    }],
                    estimated_delivery: None,
                })
                .unwrap()
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_price_derivation,
    bench_reservation_latency,
    bench_order_placement
);
criterion_main!(benches);
