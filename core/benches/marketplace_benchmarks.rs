// benches/marketplace_benchmarks.rs
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use marketplace::models::{Address, CheckoutItem, CheckoutRequest, OrderItem, Vendor};
use marketplace::services::ledger::compute_settlement;
use marketplace::services::moderation::decide;
use marketplace::services::splitter::{split_by_vendor, validate_checkout};
use marketplace::store::{collections, DocumentStore, WriteOp};
use marketplace::{MarketConfig, Marketplace, MemoryStore};
use rust_decimal::Decimal;
use serde_json::json;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn cart(vendors: usize, lines_per_vendor: usize) -> CheckoutRequest {
  let mut items = Vec::with_capacity(vendors * lines_per_vendor);
  for v in 0..vendors {
    for l in 0..lines_per_vendor {
      items.push(CheckoutItem {
        product_id: format!("p-{v}-{l}"),
        vendor_id: Some(format!("v{v}")),
        vendor_name: None,
        name: format!("Item {l}"),
        price: Decimal::new(1999 + l as i64, 2),
        quantity: 2,
        image: None,
      });
    }
  }
  CheckoutRequest {
    customer_id: "bench-customer".to_string(),
    shipping_address: Some(Address {
      line1: "1 Durbar Marg".to_string(),
      city: "Kathmandu".to_string(),
      ..Address::default()
    }),
    items,
    ..CheckoutRequest::default()
  }
}

fn vendor_doc(id: &str) -> serde_json::Value {
  json!({
    "id": id,
    "userId": id,
    "businessName": format!("Vendor {id}"),
    "email": null, "phone": null, "address": null, "description": null,
    "businessType": null, "logo": null, "banner": null,
    "status": "approved",
    "commissionRate": null,
    "revision": 1,
    "createdAt": "2024-01-01T00:00:00.000000Z",
    "updatedAt": "2024-01-01T00:00:00.000000Z",
  })
}

fn bench_split(c: &mut Criterion) {
  let mut group = c.benchmark_group("OrderSplit");
  for vendors in [1usize, 5, 20].iter() {
    let request = cart(*vendors, 4);
    let items: Vec<OrderItem> = validate_checkout(&request).unwrap();
    let names: HashMap<String, String> = (0..*vendors).map(|v| (format!("v{v}"), format!("Vendor {v}"))).collect();
    group.throughput(Throughput::Elements(items.len() as u64));
    group.bench_with_input(BenchmarkId::new("split_by_vendor", vendors), &items, |b, items| {
      b.iter(|| split_by_vendor(items, &names))
    });
  }
  group.finish();
}

fn bench_settlement_and_moderation(c: &mut Criterion) {
  let vendor: Vendor = serde_json::from_value(vendor_doc("v0")).unwrap();
  let request = cart(1, 8);
  let items = validate_checkout(&request).unwrap();
  let sub_order = split_by_vendor(&items, &HashMap::new()).unwrap().remove(0);
  let default_rate = Decimal::new(10, 0);
  c.bench_function("compute_settlement", |b| {
    b.iter(|| compute_settlement(&sub_order, &vendor, default_rate))
  });

  let denylist = MarketConfig::default().review_denylist;
  let comment = "Arrived on time, the wool is soft and the colours match the photos exactly.";
  c.bench_function("moderation_decide", |b| {
    b.iter(|| decide(3, 4, Some("Lovely shawl"), Some(comment), &denylist))
  });
}

fn bench_checkout(c: &mut Criterion) {
  let mut group = c.benchmark_group("Checkout");
  let rt = Runtime::new().unwrap();

  for vendors in [1usize, 5].iter() {
    let store = Arc::new(MemoryStore::new());
    rt.block_on(async {
      for v in 0..*vendors {
        let id = format!("v{v}");
        store
          .atomic_batch(vec![WriteOp::insert(collections::VENDORS, &id, vendor_doc(&id))])
          .await
          .unwrap();
      }
    });
    let (market, events) = Marketplace::new(store, MarketConfig::default()).unwrap();
    // Keeps the bus open; drained each iteration so it does not grow.
    let events = RefCell::new(events);
    let request = cart(*vendors, 3);

    group.bench_with_input(BenchmarkId::new("create_order", vendors), &request, |b, request| {
      b.to_async(&rt).iter(|| async {
        market.orders().create_order(request.clone()).await.unwrap();
        events.borrow_mut().drain();
      })
    });
  }
  group.finish();
}

criterion_group!(benches, bench_split, bench_settlement_and_moderation, bench_checkout);
criterion_main!(benches);
