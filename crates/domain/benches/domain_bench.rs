use std::sync::Arc;

use common::{Actor, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::catalog::{ChargingKind, ChargingOption};
use domain::{
    AddCartItem, BookingService, BookingStatus, CartService, CatalogEntity, CatalogService,
    ChargingTypeId, DependencyGuard, InMemoryCatalog, NoopInvalidator, ServiceId, resolve_price,
};
use event_store::InMemoryEventStore;

fn service(provider_id: UserId, options: Vec<ChargingOption>) -> CatalogService {
    CatalogService {
        id: ServiceId::new(),
        name: "Desentupimento de Pia".to_string(),
        description: String::new(),
        category: "Hidráulica".to_string(),
        provider_id,
        charging_options: options,
        flat_price: None,
        is_active: true,
    }
}

fn bench_resolve_price(c: &mut Criterion) {
    // Worst case: the only usable option is last
    let mut options: Vec<_> = (0..20)
        .map(|_| ChargingOption::new(ChargingTypeId::new(), ChargingKind::Hourly, Some("a combinar")))
        .collect();
    options.push(ChargingOption::new(
        ChargingTypeId::new(),
        ChargingKind::PerVisit,
        Some("80,00"),
    ));
    let svc = service(UserId::new(), options);

    c.bench_function("domain/resolve_price_21_options", |b| {
        b.iter(|| resolve_price(&svc, &svc.charging_options, None));
    });
}

struct Engine {
    catalog: InMemoryCatalog,
    cart: CartService<InMemoryEventStore>,
    bookings: BookingService<InMemoryEventStore>,
    guard: DependencyGuard<InMemoryEventStore>,
}

fn engine() -> Engine {
    let store = InMemoryEventStore::new();
    let catalog = InMemoryCatalog::new();
    Engine {
        cart: CartService::new(
            store.clone(),
            Arc::new(catalog.clone()),
            Arc::new(NoopInvalidator),
        ),
        bookings: BookingService::new(store.clone(), Arc::new(NoopInvalidator)),
        guard: DependencyGuard::new(store, Arc::new(catalog.clone())),
        catalog,
    }
}

fn visit_service(provider_id: UserId) -> CatalogService {
    service(
        provider_id,
        vec![ChargingOption::new(
            ChargingTypeId::new(),
            ChargingKind::PerVisit,
            Some("80,00"),
        )],
    )
}

fn bench_checkout(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let e = engine();
    let svc = visit_service(UserId::new());
    rt.block_on(e.catalog.insert_service(svc.clone()));
    let client = Actor::client(UserId::new());

    c.bench_function("domain/add_and_checkout", |b| {
        b.iter(|| {
            rt.block_on(async {
                let item = e
                    .cart
                    .add_item(&client, AddCartItem::new(svc.id).with_quantity(2))
                    .await
                    .unwrap();
                e.bookings
                    .checkout(&client, item.aggregate.id().unwrap())
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_full_lifecycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let e = engine();
    let provider = Actor::provider(UserId::new());
    let svc = visit_service(provider.id);
    rt.block_on(e.catalog.insert_service(svc.clone()));
    let client = Actor::client(UserId::new());

    c.bench_function("domain/checkout_to_completed", |b| {
        b.iter(|| {
            rt.block_on(async {
                let item = e
                    .cart
                    .add_item(&client, AddCartItem::new(svc.id))
                    .await
                    .unwrap();
                let booking_id = e
                    .bookings
                    .checkout(&client, item.aggregate.id().unwrap())
                    .await
                    .unwrap()
                    .aggregate
                    .id()
                    .unwrap();
                for to in [
                    BookingStatus::Accepted,
                    BookingStatus::Ongoing,
                    BookingStatus::Completed,
                ] {
                    e.bookings
                        .transition(&provider, booking_id, to, None)
                        .await
                        .unwrap();
                }
            });
        });
    });
}

fn bench_check_deletable(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let e = engine();
    let svc = visit_service(UserId::new());
    let client = Actor::client(UserId::new());

    // 100 bookings referencing the service
    rt.block_on(async {
        e.catalog.insert_service(svc.clone()).await;
        for _ in 0..100 {
            let item = e
                .cart
                .add_item(&client, AddCartItem::new(svc.id))
                .await
                .unwrap();
            e.bookings
                .checkout(&client, item.aggregate.id().unwrap())
                .await
                .unwrap();
        }
    });

    c.bench_function("domain/check_deletable_100_bookings", |b| {
        b.iter(|| {
            rt.block_on(async {
                e.guard
                    .check_deletable(CatalogEntity::Service(svc.id))
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_resolve_price,
    bench_checkout,
    bench_full_lifecycle,
    bench_check_deletable,
);
criterion_main!(benches);
