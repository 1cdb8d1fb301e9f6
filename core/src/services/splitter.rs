// core/src/services/splitter.rs

//! Pure parts of order creation: payload validation, order codes and the
//! per-vendor split. The checkout pipeline wires them to the store.

use super::{normalize_text, require_text};
use crate::error::{MarketError, MarketResult};
use crate::models::money::{line_total, round2};
use crate::models::{
  Address, CheckoutRequest, Order, OrderItem, OrderStatus, PaymentStatus, SubOrderStatus, VendorOrder,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use std::collections::HashMap;

const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn total_out_of_range() -> MarketError {
  MarketError::validation("order total out of range")
}

/// Checks the payload and returns its items in canonical form.
pub fn validate_checkout(request: &CheckoutRequest) -> MarketResult<Vec<OrderItem>> {
  require_text(&request.customer_id, "customerId")?;
  let address = request
    .shipping_address
    .as_ref()
    .ok_or_else(|| MarketError::validation("shippingAddress is required"))?;
  require_text(&address.line1, "shippingAddress.line1")?;
  require_text(&address.city, "shippingAddress.city")?;

  if request.items.is_empty() {
    return Err(MarketError::validation("order must contain at least one item"));
  }
  for (label, amount) in [
    ("shippingCost", request.shipping_cost),
    ("tax", request.tax),
    ("discount", request.discount),
    ("totalAmount", request.total_amount),
  ] {
    if amount < Decimal::ZERO {
      return Err(MarketError::validation(format!("{label} must not be negative")));
    }
  }

  request
    .items
    .iter()
    .enumerate()
    .map(|(idx, item)| {
      let vendor_id = item
        .vendor_id
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| MarketError::validation(format!("items[{idx}].vendorId is required")))?;
      let product_id = require_text(&item.product_id, &format!("items[{idx}].productId"))?;
      if item.price < Decimal::ZERO {
        return Err(MarketError::validation(format!("items[{idx}].price must not be negative")));
      }
      if item.quantity < 1 {
        return Err(MarketError::validation(format!("items[{idx}].quantity must be at least 1")));
      }
      if item.quantity > i64::from(u32::MAX) {
        return Err(MarketError::validation(format!(
          "items[{idx}].quantity must not exceed {}",
          u32::MAX
        )));
      }
      Ok(OrderItem {
        product_id,
        vendor_id: vendor_id.to_string(),
        vendor_name: normalize_text(item.vendor_name.clone()),
        name: item.name.trim().to_string(),
        price: round2(item.price),
        quantity: item.quantity as u32,
        image: normalize_text(item.image.clone()),
      })
    })
    .collect()
}

fn to_base36(mut value: u64) -> String {
  if value == 0 {
    return "0".to_string();
  }
  let mut digits = Vec::new();
  while value > 0 {
    digits.push(CODE_ALPHABET[(value % 36) as usize]);
    value /= 36;
  }
  digits.reverse();
  String::from_utf8_lossy(&digits).into_owned()
}

/// `{PREFIX}-{base36 millis}{random suffix}`, upper case.
///
/// Collisions are possible but require two checkouts in the same millisecond
/// drawing the same suffix.
pub fn generate_order_code<R: Rng + ?Sized>(prefix: &str, suffix_len: usize, at: DateTime<Utc>, rng: &mut R) -> String {
  let millis = u64::try_from(at.timestamp_millis()).unwrap_or_default();
  let suffix: String = (0..suffix_len)
    .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
    .collect();
  format!("{}-{}{}", prefix.to_ascii_uppercase(), to_base36(millis), suffix)
}

/// Groups items by vendor, keeping the order in which vendors first appear.
///
/// `vendor_names` holds the current business name per vendor; the item's own
/// vendor name is the fallback.
pub fn split_by_vendor(items: &[OrderItem], vendor_names: &HashMap<String, String>) -> MarketResult<Vec<VendorOrder>> {
  let mut groups: Vec<VendorOrder> = Vec::new();
  for item in items {
    let idx = match groups.iter().position(|g| g.vendor_id == item.vendor_id) {
      Some(idx) => idx,
      None => {
        groups.push(VendorOrder {
          vendor_id: item.vendor_id.clone(),
          vendor_name: vendor_names
            .get(&item.vendor_id)
            .cloned()
            .or_else(|| item.vendor_name.clone()),
          items: Vec::new(),
          subtotal: Decimal::ZERO,
          status: SubOrderStatus::Pending,
          tracking_number: None,
          carrier: None,
          shipped_at: None,
          delivered_at: None,
          settlement: None,
        });
        groups.len() - 1
      }
    };
    let group = &mut groups[idx];
    group.subtotal = line_total(item.price, item.quantity)
      .and_then(|line| group.subtotal.checked_add(line))
      .ok_or_else(total_out_of_range)?;
    group.items.push(item.clone());
  }
  Ok(groups)
}

/// Assembles the order aggregate. Totals other than the subtotal are taken
/// from the payload as sent.
pub fn build_order(
  id: String,
  order_number: String,
  request: &CheckoutRequest,
  items: Vec<OrderItem>,
  vendor_names: &HashMap<String, String>,
  now: DateTime<Utc>,
) -> MarketResult<Order> {
  let vendor_orders = split_by_vendor(&items, vendor_names)?;
  let subtotal = vendor_orders
    .iter()
    .try_fold(Decimal::ZERO, |acc, vo| acc.checked_add(vo.subtotal))
    .ok_or_else(total_out_of_range)?;
  let vendor_ids = vendor_orders.iter().map(|vo| vo.vendor_id.clone()).collect();
  let shipping_address = request
    .shipping_address
    .clone()
    .map(normalize_address)
    .unwrap_or_default();

  Ok(Order {
    id,
    order_number,
    customer_id: request.customer_id.trim().to_string(),
    customer_name: normalize_text(request.customer_name.clone()),
    customer_email: normalize_text(request.customer_email.clone()),
    customer_phone: normalize_text(request.customer_phone.clone()),
    shipping_address,
    items,
    vendor_orders,
    vendor_ids,
    subtotal,
    shipping_cost: round2(request.shipping_cost),
    tax: round2(request.tax),
    discount: round2(request.discount),
    coupon_code: normalize_text(request.coupon_code.clone()),
    total_amount: round2(request.total_amount),
    payment_method: normalize_text(request.payment_method.clone()),
    payment_status: PaymentStatus::Pending,
    status: OrderStatus::Pending,
    notes: normalize_text(request.notes.clone()),
    cancellation: None,
    return_request: None,
    revision: 1,
    created_at: Some(now),
    updated_at: Some(now),
  })
}

fn normalize_address(address: Address) -> Address {
  Address {
    full_name: normalize_text(address.full_name),
    line1: address.line1.trim().to_string(),
    line2: normalize_text(address.line2),
    city: address.city.trim().to_string(),
    state: normalize_text(address.state),
    postal_code: normalize_text(address.postal_code),
    country: normalize_text(address.country),
    phone: normalize_text(address.phone),
  }
}
