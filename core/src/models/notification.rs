// core/src/models/notification.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Type tag of a notification; one per catalogue template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
  OrderPlaced,
  OrderShipped,
  OrderDelivered,
  OrderCancelled,
  VendorNewOrder,
  ProductApproved,
  ProductRejected,
  VendorSuspended,
  VendorActivated,
  NewReview,
  AdminNewVendor,
  AdminNewOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
  pub id: String,
  pub user_id: String,
  pub kind: NotificationKind,
  pub title: String,
  pub message: String,
  pub link: Option<String>,
  #[serde(default)]
  pub read: bool,
  pub created_at: Option<DateTime<Utc>>,
}

/// A rendered notification that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
  pub user_id: String,
  pub kind: NotificationKind,
  pub title: String,
  pub message: String,
  pub link: Option<String>,
}

/// The fixed message catalogue.
#[derive(Debug, Clone, PartialEq)]
pub enum Template<'a> {
  OrderPlaced { order_id: &'a str, order_number: &'a str, total: Decimal },
  OrderShipped { order_id: &'a str, order_number: &'a str, vendor_name: Option<&'a str> },
  OrderDelivered { order_id: &'a str, order_number: &'a str, vendor_name: Option<&'a str> },
  OrderCancelled { order_id: &'a str, order_number: &'a str, reason: Option<&'a str> },
  VendorNewOrder { order_id: &'a str, order_number: &'a str, subtotal: Decimal },
  ProductApproved { product_id: &'a str, product_name: &'a str },
  ProductRejected { product_id: &'a str, product_name: &'a str, reason: Option<&'a str> },
  VendorSuspended { business_name: &'a str },
  VendorActivated { business_name: &'a str },
  NewReview { review_id: &'a str, rating: u8 },
  AdminNewVendor { vendor_id: &'a str, business_name: &'a str },
  AdminNewOrder { order_id: &'a str, order_number: &'a str, total: Decimal },
}

impl Template<'_> {
  pub fn render(&self, user_id: &str) -> NewNotification {
    let (kind, title, message, link) = match self {
      Template::OrderPlaced { order_id, order_number, total } => (
        NotificationKind::OrderPlaced,
        "Order placed".to_string(),
        format!("Your order {order_number} has been placed. Total: Rs. {total}"),
        Some(format!("/orders/{order_id}")),
      ),
      Template::OrderShipped { order_id, order_number, vendor_name } => (
        NotificationKind::OrderShipped,
        "Order shipped".to_string(),
        match vendor_name {
          Some(name) => format!("Items from {name} in order {order_number} have been shipped."),
          None => format!("Your order {order_number} has been shipped."),
        },
        Some(format!("/orders/{order_id}")),
      ),
      Template::OrderDelivered { order_id, order_number, vendor_name } => (
        NotificationKind::OrderDelivered,
        "Order delivered".to_string(),
        match vendor_name {
          Some(name) => format!("Items from {name} in order {order_number} have been delivered."),
          None => format!("Your order {order_number} has been delivered."),
        },
        Some(format!("/orders/{order_id}")),
      ),
      Template::OrderCancelled { order_id, order_number, reason } => (
        NotificationKind::OrderCancelled,
        "Order cancelled".to_string(),
        match reason {
          Some(reason) => format!("Order {order_number} was cancelled: {reason}"),
          None => format!("Order {order_number} was cancelled."),
        },
        Some(format!("/orders/{order_id}")),
      ),
      Template::VendorNewOrder { order_id, order_number, subtotal } => (
        NotificationKind::VendorNewOrder,
        "New order".to_string(),
        format!("You received a new order {order_number} worth Rs. {subtotal}."),
        Some(format!("/vendor/orders/{order_id}")),
      ),
      Template::ProductApproved { product_id, product_name } => (
        NotificationKind::ProductApproved,
        "Product approved".to_string(),
        format!("Your product \"{product_name}\" is now live."),
        Some(format!("/vendor/products/{product_id}")),
      ),
      Template::ProductRejected { product_id, product_name, reason } => (
        NotificationKind::ProductRejected,
        "Product rejected".to_string(),
        match reason {
          Some(reason) => format!("Your product \"{product_name}\" was rejected: {reason}"),
          None => format!("Your product \"{product_name}\" was rejected."),
        },
        Some(format!("/vendor/products/{product_id}")),
      ),
      Template::VendorSuspended { business_name } => (
        NotificationKind::VendorSuspended,
        "Store suspended".to_string(),
        format!("Your store {business_name} has been suspended."),
        Some("/vendor/dashboard".to_string()),
      ),
      Template::VendorActivated { business_name } => (
        NotificationKind::VendorActivated,
        "Store approved".to_string(),
        format!("Your store {business_name} is now active."),
        Some("/vendor/dashboard".to_string()),
      ),
      Template::NewReview { review_id, rating } => (
        NotificationKind::NewReview,
        "New review".to_string(),
        format!("You received a new {rating}-star review."),
        Some(format!("/vendor/reviews/{review_id}")),
      ),
      Template::AdminNewVendor { vendor_id, business_name } => (
        NotificationKind::AdminNewVendor,
        "New vendor registration".to_string(),
        format!("{business_name} applied to become a vendor."),
        Some(format!("/admin/vendors/{vendor_id}")),
      ),
      Template::AdminNewOrder { order_id, order_number, total } => (
        NotificationKind::AdminNewOrder,
        "New order".to_string(),
        format!("Order {order_number} was placed. Total: Rs. {total}"),
        Some(format!("/admin/orders/{order_id}")),
      ),
    };
    NewNotification {
      user_id: user_id.to_string(),
      kind,
      title,
      message,
      link,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn shipped_template_names_the_order_and_links_to_it() {
    let rendered = Template::OrderShipped {
      order_id: "o-1",
      order_number: "ORD-ABC",
      vendor_name: None,
    }
    .render("cust-1");
    assert_eq!(rendered.kind, NotificationKind::OrderShipped);
    assert!(rendered.message.contains("ORD-ABC"));
    assert_eq!(rendered.link.as_deref(), Some("/orders/o-1"));
    assert_eq!(rendered.user_id, "cust-1");
  }
}
