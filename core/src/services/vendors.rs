// core/src/services/vendors.rs

use super::ledger::guarded_vendor_update;
use super::{normalize_text, require_text, with_cas_retry};
use crate::error::{MarketError, MarketResult, StoreError};
use crate::events::DomainEvent;
use crate::models::money::is_valid_rate;
use crate::models::{
  Order, SubOrderStatus, UserRole, Vendor, VendorCustomer, VendorProfileUpdate, VendorRegistration, VendorStatus,
};
use crate::state::MarketState;
use crate::store::{collections, fetch, fetch_all, stamp, to_document, with_deadline, Direction, Query, WriteOp};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::{event, instrument, Level};

/// Role the owning user holds once the vendor reaches `status`.
fn role_for(status: VendorStatus) -> Option<UserRole> {
  match status {
    VendorStatus::Approved => Some(UserRole::Vendor),
    VendorStatus::Suspended | VendorStatus::Rejected => Some(UserRole::Customer),
    VendorStatus::Pending => None,
  }
}

#[derive(Clone, Debug)]
pub struct VendorService {
  state: MarketState,
}

impl VendorService {
  pub fn new(state: MarketState) -> Self {
    Self { state }
  }

  /// Creates a pending vendor keyed by the owner's user id. Bounded by the
  /// configured registration deadline.
  #[instrument(
    name = "VendorService::register_vendor",
    skip_all,
    fields(user_id = %registration.user_id),
    err(Display)
  )]
  pub async fn register_vendor(&self, registration: VendorRegistration) -> MarketResult<Vendor> {
    let user_id = require_text(&registration.user_id, "userId")?;
    let business_name = require_text(&registration.business_name, "businessName")?;
    let now = Utc::now();
    let vendor = Vendor {
      id: user_id.clone(),
      user_id,
      business_name,
      email: normalize_text(registration.email),
      phone: normalize_text(registration.phone),
      address: registration.address,
      description: normalize_text(registration.description),
      business_type: normalize_text(registration.business_type),
      logo: normalize_text(registration.logo),
      banner: normalize_text(registration.banner),
      bank_details: registration.bank_details,
      status: VendorStatus::Pending,
      commission_rate: None,
      rating: 0.0,
      review_count: 0,
      total_sales: Decimal::ZERO,
      total_earnings: Decimal::ZERO,
      available_balance: Decimal::ZERO,
      pending_balance: Decimal::ZERO,
      verification_documents: registration.verification_documents,
      revision: 1,
      created_at: Some(now),
      updated_at: Some(now),
    };

    let store = self.state.store();
    let timeout = self.state.config.vendor_registration_timeout;
    let vendor_ref = &vendor;
    with_deadline("register_vendor", timeout, async move {
      if store.get(collections::VENDORS, &vendor_ref.id).await?.is_some() {
        return Err(MarketError::validation(format!(
          "a vendor is already registered for user '{}'",
          vendor_ref.id
        )));
      }
      let mut body = to_document(vendor_ref)?;
      stamp(&mut body, &["createdAt", "updatedAt"]);
      match store
        .atomic_batch(vec![WriteOp::insert(collections::VENDORS, &vendor_ref.id, body)])
        .await
      {
        Ok(()) => Ok::<_, MarketError>(()),
        Err(StoreError::AlreadyExists { .. }) => Err(MarketError::validation(format!(
          "a vendor is already registered for user '{}'",
          vendor_ref.id
        ))),
        Err(e) => Err(e.into()),
      }
    })
    .await?;

    event!(Level::INFO, vendor_id = %vendor.id, business_name = %vendor.business_name, "Vendor registered.");
    self.state.events.publish(DomainEvent::VendorRegistered {
      vendor_id: vendor.id.clone(),
      business_name: vendor.business_name.clone(),
    });
    self.get_vendor(&vendor.id).await
  }

  pub async fn get_vendor(&self, vendor_id: &str) -> MarketResult<Vendor> {
    fetch(self.state.store(), collections::VENDORS, "vendor", vendor_id).await
  }

  pub async fn list_vendors(&self, status: Option<VendorStatus>) -> MarketResult<Vec<Vendor>> {
    let mut query = Query::new();
    if let Some(status) = status {
      query = query.where_eq("status", status.as_str());
    }
    fetch_all(
      self.state.store(),
      collections::VENDORS,
      &query.order_by("createdAt", Direction::Desc),
    )
    .await
  }

  /// Profile and bank fields only. Balances, status and commission have
  /// their own guarded operations.
  #[instrument(name = "VendorService::update_vendor_profile", skip(self, update), err(Display))]
  pub async fn update_vendor_profile(&self, vendor_id: &str, update: VendorProfileUpdate) -> MarketResult<Vendor> {
    self.get_vendor(vendor_id).await?;

    let mut patch = Map::new();
    if let Some(name) = update.business_name {
      patch.insert("businessName".to_string(), json!(require_text(&name, "businessName")?));
    }
    let optional_text = [
      ("email", update.email),
      ("phone", update.phone),
      ("description", update.description),
      ("businessType", update.business_type),
      ("logo", update.logo),
      ("banner", update.banner),
    ];
    for (field, value) in optional_text {
      if value.is_some() {
        patch.insert(field.to_string(), json!(normalize_text(value)));
      }
    }
    if let Some(address) = update.address {
      patch.insert("address".to_string(), serde_json::to_value(address)?);
    }
    if let Some(bank_details) = update.bank_details {
      patch.insert("bankDetails".to_string(), serde_json::to_value(bank_details)?);
    }
    if patch.is_empty() {
      return Err(MarketError::validation("no profile fields to update"));
    }

    let mut patch = Value::Object(patch);
    stamp(&mut patch, &["updatedAt"]);
    self.state.store().update(collections::VENDORS, vendor_id, patch).await?;
    self.get_vendor(vendor_id).await
  }

  /// Admin status change. The owning user's role follows in the same batch.
  #[instrument(name = "VendorService::update_vendor_status", skip(self), err(Display))]
  pub async fn update_vendor_status(&self, vendor_id: &str, status: VendorStatus) -> MarketResult<Vendor> {
    let store = self.state.store();
    let (vendor, role) = with_cas_retry(vendor_id, self.state.config.cas_max_attempts, move |_| async move {
      let vendor: Vendor = fetch(store, collections::VENDORS, "vendor", vendor_id).await?;
      if vendor.status == status {
        return Err(MarketError::State {
          subject: format!("vendor {vendor_id}"),
          from: vendor.status.to_string(),
          to: status.to_string(),
        });
      }
      let mut ops = vec![guarded_vendor_update(&vendor, json!({ "status": status }))];
      let role = role_for(status);
      if let Some(role) = role {
        if store.get(collections::USERS, &vendor.user_id).await?.is_some() {
          ops.push(WriteOp::update(collections::USERS, &vendor.user_id, json!({ "role": role })));
        } else {
          event!(Level::WARN, vendor_id, user_id = %vendor.user_id, "Owning user record missing; role left unchanged.");
        }
      }
      store.atomic_batch(ops).await?;
      Ok::<_, MarketError>((vendor, role))
    })
    .await?;

    event!(Level::INFO, vendor_id, from = %vendor.status, to = %status, ?role, "Vendor status updated.");
    self.state.events.publish(DomainEvent::VendorStatusChanged {
      vendor_id: vendor.id.clone(),
      business_name: vendor.business_name.clone(),
      from: vendor.status,
      to: status,
    });
    self.get_vendor(vendor_id).await
  }

  /// `None` restores the platform default.
  #[instrument(name = "VendorService::set_commission_rate", skip(self), err(Display))]
  pub async fn set_commission_rate(&self, vendor_id: &str, rate: Option<Decimal>) -> MarketResult<Vendor> {
    if let Some(rate) = rate {
      if !is_valid_rate(rate) {
        return Err(MarketError::validation(format!("commission rate must be within 0..=100, got {rate}")));
      }
    }
    let store = self.state.store();
    with_cas_retry(vendor_id, self.state.config.cas_max_attempts, move |_| async move {
      let vendor: Vendor = fetch(store, collections::VENDORS, "vendor", vendor_id).await?;
      store
        .atomic_batch(vec![guarded_vendor_update(&vendor, json!({ "commissionRate": rate }))])
        .await?;
      Ok::<_, MarketError>(())
    })
    .await?;
    self.get_vendor(vendor_id).await
  }

  /// Distinct customers with at least one live sub-order from the vendor,
  /// biggest spenders first.
  pub async fn list_vendor_customers(&self, vendor_id: &str) -> MarketResult<Vec<VendorCustomer>> {
    let orders: Vec<Order> = fetch_all(
      self.state.store(),
      collections::ORDERS,
      &Query::new()
        .array_contains("vendorIds", vendor_id)
        .order_by("createdAt", Direction::Asc),
    )
    .await?;

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut customers: Vec<VendorCustomer> = Vec::new();
    for order in &orders {
      let Some(fragment) = order.vendor_order(vendor_id) else {
        continue;
      };
      if fragment.status == SubOrderStatus::Cancelled {
        continue;
      }
      let slot = *index.entry(order.customer_id.clone()).or_insert_with(|| {
        customers.push(VendorCustomer {
          customer_id: order.customer_id.clone(),
          customer_name: order.customer_name.clone(),
          customer_email: order.customer_email.clone(),
          order_count: 0,
          total_spent: Decimal::ZERO,
          last_order_at: None,
        });
        customers.len() - 1
      });
      let customer = &mut customers[slot];
      customer.order_count += 1;
      customer.total_spent += fragment.subtotal;
      customer.last_order_at = customer.last_order_at.max(order.created_at);
      if order.customer_name.is_some() {
        customer.customer_name = order.customer_name.clone();
      }
    }
    customers.sort_by(|a, b| b.total_spent.cmp(&a.total_spent));
    Ok(customers)
  }
}
