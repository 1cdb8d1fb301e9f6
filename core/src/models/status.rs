// core/src/models/status.rs

//! Closed status enums for every state machine in the marketplace, with the
//! transition tables that decide legality.

use crate::error::MarketError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of one vendor's portion of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubOrderStatus {
  Pending,
  Confirmed,
  Processing,
  Shipped,
  Delivered,
  Cancelled,
}

impl SubOrderStatus {
  pub const ALL: [SubOrderStatus; 6] = [
    SubOrderStatus::Pending,
    SubOrderStatus::Confirmed,
    SubOrderStatus::Processing,
    SubOrderStatus::Shipped,
    SubOrderStatus::Delivered,
    SubOrderStatus::Cancelled,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      SubOrderStatus::Pending => "pending",
      SubOrderStatus::Confirmed => "confirmed",
      SubOrderStatus::Processing => "processing",
      SubOrderStatus::Shipped => "shipped",
      SubOrderStatus::Delivered => "delivered",
      SubOrderStatus::Cancelled => "cancelled",
    }
  }

  /// Position on the forward path; `None` for `Cancelled`.
  fn rank(self) -> Option<u8> {
    match self {
      SubOrderStatus::Pending => Some(0),
      SubOrderStatus::Confirmed => Some(1),
      SubOrderStatus::Processing => Some(2),
      SubOrderStatus::Shipped => Some(3),
      SubOrderStatus::Delivered => Some(4),
      SubOrderStatus::Cancelled => None,
    }
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, SubOrderStatus::Delivered | SubOrderStatus::Cancelled)
  }

  /// Forward moves (skipping allowed) and cancellation of a live sub-order.
  pub fn can_transition_to(self, next: SubOrderStatus) -> bool {
    if self.is_terminal() {
      return false;
    }
    match (self.rank(), next.rank()) {
      (_, None) => true,
      (Some(from), Some(to)) => to > from,
      (None, _) => false,
    }
  }

  /// Statuses whose transition is reported to the customer.
  pub fn notifies_customer(self) -> bool {
    matches!(
      self,
      SubOrderStatus::Shipped | SubOrderStatus::Delivered | SubOrderStatus::Cancelled
    )
  }
}

/// Administrative status of the order as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderStatus {
  Pending,
  Confirmed,
  Processing,
  Shipped,
  Delivered,
  ReturnRequested,
  Returned,
  Cancelled,
}

impl OrderStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      OrderStatus::Pending => "pending",
      OrderStatus::Confirmed => "confirmed",
      OrderStatus::Processing => "processing",
      OrderStatus::Shipped => "shipped",
      OrderStatus::Delivered => "delivered",
      OrderStatus::ReturnRequested => "returnRequested",
      OrderStatus::Returned => "returned",
      OrderStatus::Cancelled => "cancelled",
    }
  }

  fn rank(self) -> Option<u8> {
    match self {
      OrderStatus::Pending => Some(0),
      OrderStatus::Confirmed => Some(1),
      OrderStatus::Processing => Some(2),
      OrderStatus::Shipped => Some(3),
      OrderStatus::Delivered => Some(4),
      OrderStatus::ReturnRequested => Some(5),
      OrderStatus::Returned => Some(6),
      OrderStatus::Cancelled => None,
    }
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, OrderStatus::Returned | OrderStatus::Cancelled)
  }

  pub fn in_return_path(self) -> bool {
    matches!(self, OrderStatus::ReturnRequested | OrderStatus::Returned)
  }

  /// Cancellation is only open before delivery.
  pub fn is_cancellable(self) -> bool {
    matches!(
      self,
      OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Processing | OrderStatus::Shipped
    )
  }

  /// Forward moves only. The return path is entered from `delivered` and
  /// left only towards `returned`.
  pub fn can_transition_to(self, next: OrderStatus) -> bool {
    if self.is_terminal() {
      return false;
    }
    match next {
      OrderStatus::ReturnRequested => return self == OrderStatus::Delivered,
      OrderStatus::Returned => return self == OrderStatus::ReturnRequested,
      _ => {}
    }
    match (self.rank(), next.rank()) {
      (_, None) => self.is_cancellable(),
      (Some(from), Some(to)) => to > from,
      (None, _) => false,
    }
  }

  pub fn notifies_customer(self) -> bool {
    matches!(self, OrderStatus::Shipped | OrderStatus::Delivered)
  }
}

impl From<SubOrderStatus> for OrderStatus {
  fn from(status: SubOrderStatus) -> Self {
    match status {
      SubOrderStatus::Pending => OrderStatus::Pending,
      SubOrderStatus::Confirmed => OrderStatus::Confirmed,
      SubOrderStatus::Processing => OrderStatus::Processing,
      SubOrderStatus::Shipped => OrderStatus::Shipped,
      SubOrderStatus::Delivered => OrderStatus::Delivered,
      SubOrderStatus::Cancelled => OrderStatus::Cancelled,
    }
  }
}

/// Overall status implied by the sub-orders: the least advanced live
/// sub-order, or `Cancelled` once every sub-order is cancelled.
pub fn derive_overall_status(sub_statuses: &[SubOrderStatus]) -> Option<OrderStatus> {
  if sub_statuses.is_empty() {
    return None;
  }
  let least_advanced = sub_statuses
    .iter()
    .filter(|s| **s != SubOrderStatus::Cancelled)
    .min_by_key(|s| s.rank());
  Some(match least_advanced {
    Some(status) => OrderStatus::from(*status),
    None => OrderStatus::Cancelled,
  })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentStatus {
  Pending,
  Paid,
  Failed,
  Refunded,
}

impl PaymentStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      PaymentStatus::Pending => "pending",
      PaymentStatus::Paid => "paid",
      PaymentStatus::Failed => "failed",
      PaymentStatus::Refunded => "refunded",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VendorStatus {
  Pending,
  Approved,
  Suspended,
  Rejected,
}

impl VendorStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      VendorStatus::Pending => "pending",
      VendorStatus::Approved => "approved",
      VendorStatus::Suspended => "suspended",
      VendorStatus::Rejected => "rejected",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReviewStatus {
  Pending,
  Approved,
  Rejected,
}

impl ReviewStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      ReviewStatus::Pending => "pending",
      ReviewStatus::Approved => "approved",
      ReviewStatus::Rejected => "rejected",
    }
  }
}

macro_rules! text_status {
  ($($ty:ident => [$($variant:ident),+]);+ $(;)?) => {
    $(
      impl fmt::Display for $ty {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
          f.write_str(self.as_str())
        }
      }

      impl FromStr for $ty {
        type Err = MarketError;

        fn from_str(text: &str) -> Result<Self, Self::Err> {
          $(
            if $ty::$variant.as_str() == text {
              return Ok($ty::$variant);
            }
          )+
          Err(MarketError::validation(format!(
            "unknown {} '{}'",
            stringify!($ty),
            text
          )))
        }
      }
    )+
  };
}

text_status! {
  SubOrderStatus => [Pending, Confirmed, Processing, Shipped, Delivered, Cancelled];
  OrderStatus => [Pending, Confirmed, Processing, Shipped, Delivered, ReturnRequested, Returned, Cancelled];
  PaymentStatus => [Pending, Paid, Failed, Refunded];
  VendorStatus => [Pending, Approved, Suspended, Rejected];
  ReviewStatus => [Pending, Approved, Rejected];
}

#[cfg(test)]
mod tests {
  use super::*;
  use SubOrderStatus::*;

  #[test]
  fn sub_order_moves_forward_only() {
    assert!(Pending.can_transition_to(Confirmed));
    assert!(Pending.can_transition_to(Shipped));
    assert!(Shipped.can_transition_to(Cancelled));
    assert!(!Shipped.can_transition_to(Shipped));
    assert!(!Shipped.can_transition_to(Processing));
    assert!(!Delivered.can_transition_to(Delivered));
    assert!(!Delivered.can_transition_to(Cancelled));
    assert!(!Cancelled.can_transition_to(Pending));
  }

  #[test]
  fn overall_return_path_only_after_delivery() {
    assert!(OrderStatus::Delivered.can_transition_to(OrderStatus::ReturnRequested));
    assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
    assert!(OrderStatus::ReturnRequested.can_transition_to(OrderStatus::Returned));
    assert!(!OrderStatus::Returned.can_transition_to(OrderStatus::Cancelled));
    assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::ReturnRequested));
    assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::ReturnRequested));
    assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Returned));
    assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Returned));
  }

  #[test]
  fn derived_status_follows_least_advanced_live_sub_order() {
    assert_eq!(derive_overall_status(&[Delivered, Shipped]), Some(OrderStatus::Shipped));
    assert_eq!(derive_overall_status(&[Delivered, Cancelled]), Some(OrderStatus::Delivered));
    assert_eq!(derive_overall_status(&[Cancelled, Cancelled]), Some(OrderStatus::Cancelled));
    assert_eq!(derive_overall_status(&[]), None);
  }

  #[test]
  fn statuses_parse_from_wire_names() {
    assert_eq!("returnRequested".parse::<OrderStatus>().unwrap(), OrderStatus::ReturnRequested);
    assert!("shipping".parse::<SubOrderStatus>().is_err());
  }
}
