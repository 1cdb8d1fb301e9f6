// core/src/events.rs

//! Domain events. State-changing operations publish here after their write
//! has committed; the [`crate::services::notifications::NotificationDispatcher`]
//! turns them into inbox messages on its own schedule.

use crate::models::{OrderStatus, ReviewStatus, SubOrderStatus, VendorStatus};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{event, Level};

#[derive(Debug, Clone, PartialEq)]
pub struct VendorShare {
  pub vendor_id: String,
  pub subtotal: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
  OrderPlaced {
    order_id: String,
    order_number: String,
    customer_id: String,
    total: Decimal,
    vendors: Vec<VendorShare>,
  },
  SubOrderStatusChanged {
    order_id: String,
    order_number: String,
    customer_id: String,
    vendor_id: String,
    vendor_name: Option<String>,
    from: SubOrderStatus,
    to: SubOrderStatus,
  },
  OrderStatusChanged {
    order_id: String,
    order_number: String,
    customer_id: String,
    from: OrderStatus,
    to: OrderStatus,
  },
  OrderCancelled {
    order_id: String,
    order_number: String,
    customer_id: String,
    reason: Option<String>,
    vendor_ids: Vec<String>,
  },
  ReturnRequested {
    order_id: String,
    order_number: String,
    customer_id: String,
  },
  VendorRegistered {
    vendor_id: String,
    business_name: String,
  },
  VendorStatusChanged {
    vendor_id: String,
    business_name: String,
    from: VendorStatus,
    to: VendorStatus,
  },
  ProductModerated {
    product_id: String,
    vendor_id: String,
    product_name: String,
    approved: bool,
    reason: Option<String>,
  },
  ReviewSubmitted {
    review_id: String,
    vendor_id: String,
    product_id: Option<String>,
    rating: u8,
    status: ReviewStatus,
  },
  PayoutRequested {
    payout_id: String,
    vendor_id: String,
    amount: Decimal,
  },
}

impl DomainEvent {
  pub fn name(&self) -> &'static str {
    match self {
      DomainEvent::OrderPlaced { .. } => "order_placed",
      DomainEvent::SubOrderStatusChanged { .. } => "sub_order_status_changed",
      DomainEvent::OrderStatusChanged { .. } => "order_status_changed",
      DomainEvent::OrderCancelled { .. } => "order_cancelled",
      DomainEvent::ReturnRequested { .. } => "return_requested",
      DomainEvent::VendorRegistered { .. } => "vendor_registered",
      DomainEvent::VendorStatusChanged { .. } => "vendor_status_changed",
      DomainEvent::ProductModerated { .. } => "product_moderated",
      DomainEvent::ReviewSubmitted { .. } => "review_submitted",
      DomainEvent::PayoutRequested { .. } => "payout_requested",
    }
  }
}

/// Publishing half. Cheap to clone; publishing never fails the caller.
#[derive(Debug, Clone)]
pub struct EventBus {
  sender: mpsc::UnboundedSender<DomainEvent>,
}

/// Consuming half, owned by the dispatcher (or a test).
#[derive(Debug)]
pub struct EventStream {
  receiver: mpsc::UnboundedReceiver<DomainEvent>,
}

impl EventBus {
  pub fn channel() -> (EventBus, EventStream) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (EventBus { sender }, EventStream { receiver })
  }

  pub fn publish(&self, domain_event: DomainEvent) {
    let name = domain_event.name();
    if self.sender.send(domain_event).is_err() {
      event!(Level::WARN, event = name, "Event stream closed; event dropped.");
    } else {
      event!(Level::DEBUG, event = name, "Domain event published.");
    }
  }
}

impl EventStream {
  /// Waits for the next event; `None` once every bus handle is gone.
  pub async fn recv(&mut self) -> Option<DomainEvent> {
    self.receiver.recv().await
  }

  /// Takes whatever is queued right now.
  pub fn drain(&mut self) -> Vec<DomainEvent> {
    let mut events = Vec::new();
    while let Ok(next) = self.receiver.try_recv() {
      events.push(next);
    }
    events
  }
}
