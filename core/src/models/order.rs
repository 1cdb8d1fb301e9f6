// core/src/models/order.rs

use super::status::{OrderStatus, PaymentStatus, SubOrderStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Shipping address as captured at checkout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
  pub full_name: Option<String>,
  pub line1: String,
  pub line2: Option<String>,
  pub city: String,
  pub state: Option<String>,
  pub postal_code: Option<String>,
  pub country: Option<String>,
  pub phone: Option<String>,
}

/// One line of the flat item list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
  pub product_id: String,
  pub vendor_id: String,
  /// Seller name as shown in the cart.
  #[serde(default)]
  pub vendor_name: Option<String>,
  pub name: String,
  pub price: Decimal,
  pub quantity: u32,
  #[serde(default)]
  pub image: Option<String>,
}

/// Money settled for a delivered sub-order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
  pub gross: Decimal,
  pub fee: Decimal,
  pub net: Decimal,
  pub commission_rate: Decimal,
  pub settled_at: Option<DateTime<Utc>>,
}

/// A vendor's portion of an order, embedded in `Order::vendor_orders`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorOrder {
  pub vendor_id: String,
  pub vendor_name: Option<String>,
  pub items: Vec<OrderItem>,
  pub subtotal: Decimal,
  pub status: SubOrderStatus,
  #[serde(default)]
  pub tracking_number: Option<String>,
  #[serde(default)]
  pub carrier: Option<String>,
  #[serde(default)]
  pub shipped_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub delivered_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub settlement: Option<Settlement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationRecord {
  pub reason: Option<String>,
  pub cancelled_by: String,
  pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRequest {
  pub reason: String,
  pub requested_by: String,
  pub requested_at: DateTime<Utc>,
}

/// Root aggregate for one checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: String,
  pub order_number: String,
  pub customer_id: String,
  pub customer_name: Option<String>,
  pub customer_email: Option<String>,
  pub customer_phone: Option<String>,
  pub shipping_address: Address,
  pub items: Vec<OrderItem>,
  pub vendor_orders: Vec<VendorOrder>,
  /// Distinct vendor ids, in first-seen order.
  pub vendor_ids: Vec<String>,
  pub subtotal: Decimal,
  pub shipping_cost: Decimal,
  pub tax: Decimal,
  pub discount: Decimal,
  pub coupon_code: Option<String>,
  pub total_amount: Decimal,
  pub payment_method: Option<String>,
  pub payment_status: PaymentStatus,
  pub status: OrderStatus,
  pub notes: Option<String>,
  #[serde(default)]
  pub cancellation: Option<CancellationRecord>,
  #[serde(default)]
  pub return_request: Option<ReturnRequest>,
  /// Bumped on every write; guards compare-and-swap updates.
  #[serde(default)]
  pub revision: u64,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
  pub fn vendor_order(&self, vendor_id: &str) -> Option<&VendorOrder> {
    self.vendor_orders.iter().find(|vo| vo.vendor_id == vendor_id)
  }

  pub fn vendor_order_index(&self, vendor_id: &str) -> Option<usize> {
    self.vendor_orders.iter().position(|vo| vo.vendor_id == vendor_id)
  }

  pub fn sub_statuses(&self) -> Vec<SubOrderStatus> {
    self.vendor_orders.iter().map(|vo| vo.status).collect()
  }

  /// Every live sub-order has been delivered (and at least one exists).
  pub fn all_live_sub_orders_delivered(&self) -> bool {
    let mut live = self
      .vendor_orders
      .iter()
      .filter(|vo| vo.status != SubOrderStatus::Cancelled)
      .peekable();
    live.peek().is_some() && live.all(|vo| vo.status == SubOrderStatus::Delivered)
  }
}

/// Checkout payload handed to `create_order`. Totals are trusted as sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckoutRequest {
  pub customer_id: String,
  pub customer_name: Option<String>,
  pub customer_email: Option<String>,
  pub customer_phone: Option<String>,
  pub shipping_address: Option<Address>,
  pub items: Vec<CheckoutItem>,
  pub shipping_cost: Decimal,
  pub tax: Decimal,
  pub discount: Decimal,
  pub coupon_code: Option<String>,
  pub total_amount: Decimal,
  pub payment_method: Option<String>,
  pub notes: Option<String>,
}

/// Cart line as sent by the client; prices may be negative or zero quantity
/// here and are rejected by validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckoutItem {
  pub product_id: String,
  pub vendor_id: Option<String>,
  pub vendor_name: Option<String>,
  pub name: String,
  pub price: Decimal,
  pub quantity: i64,
  pub image: Option<String>,
}
