// core/src/pipelines/contexts.rs

//! Data carried through each registered pipeline. Handlers receive these
//! wrapped in [`crate::workflow::ContextData`].

use crate::models::{
  CheckoutRequest, ModerationDecision, Order, OrderItem, Payout, PayoutRequest, Review, ReviewInput, Vendor,
};
use crate::state::MarketState;
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct CheckoutCtxData {
  pub state: MarketState,
  pub request: CheckoutRequest,
  /// Validated, canonical items.
  pub items: Vec<OrderItem>,
  /// Current business name per vendor in the cart.
  pub vendor_names: HashMap<String, String>,
  pub order: Option<Order>,
  pub persist_attempts: u32,
}

impl CheckoutCtxData {
  pub fn new(state: MarketState, request: CheckoutRequest) -> Self {
    Self {
      state,
      request,
      items: Vec::new(),
      vendor_names: HashMap::new(),
      order: None,
      persist_attempts: 0,
    }
  }
}

#[derive(Clone, Debug)]
pub struct PayoutCtxData {
  pub state: MarketState,
  pub vendor_id: String,
  pub amount: Decimal,
  pub request: PayoutRequest,
  /// Vendor as read by the attempt that committed.
  pub vendor: Option<Vendor>,
  pub payout: Option<Payout>,
}

impl PayoutCtxData {
  pub fn new(state: MarketState, vendor_id: &str, amount: Decimal, request: PayoutRequest) -> Self {
    Self {
      state,
      vendor_id: vendor_id.trim().to_string(),
      amount,
      request,
      vendor: None,
      payout: None,
    }
  }
}

#[derive(Clone, Debug)]
pub struct ReviewSubmissionCtxData {
  pub state: MarketState,
  pub input: ReviewInput,
  pub customer_id: String,
  pub product_id: Option<String>,
  pub vendor_id: Option<String>,
  pub rating: u8,
  pub decision: Option<ModerationDecision>,
  pub review: Option<Review>,
}

impl ReviewSubmissionCtxData {
  pub fn new(state: MarketState, input: ReviewInput) -> Self {
    Self {
      state,
      input,
      customer_id: String::new(),
      product_id: None,
      vendor_id: None,
      rating: 0,
      decision: None,
      review: None,
    }
  }
}
