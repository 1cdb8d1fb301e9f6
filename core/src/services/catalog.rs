// core/src/services/catalog.rs

//! The slice of the product catalogue the marketplace owns: moderation of
//! vendor listings. Product CRUD lives outside this crate.

use super::normalize_text;
use crate::error::MarketResult;
use crate::events::DomainEvent;
use crate::models::{Product, ProductStatus};
use crate::state::MarketState;
use crate::store::{collections, fetch, fetch_all, stamp, Direction, Query};
use serde_json::json;
use tracing::{event, instrument, Level};

#[derive(Clone, Debug)]
pub struct CatalogService {
  state: MarketState,
}

impl CatalogService {
  pub fn new(state: MarketState) -> Self {
    Self { state }
  }

  pub async fn get_product(&self, product_id: &str) -> MarketResult<Product> {
    fetch(self.state.store(), collections::PRODUCTS, "product", product_id).await
  }

  pub async fn list_by_vendor(&self, vendor_id: &str) -> MarketResult<Vec<Product>> {
    fetch_all(
      self.state.store(),
      collections::PRODUCTS,
      &Query::new().where_eq("vendorId", vendor_id).order_by("name", Direction::Asc),
    )
    .await
  }

  /// Approves or rejects a listing and tells the vendor.
  #[instrument(name = "CatalogService::moderate_product", skip(self, reason), err(Display))]
  pub async fn moderate_product(&self, product_id: &str, approved: bool, reason: Option<String>) -> MarketResult<Product> {
    let product = self.get_product(product_id).await?;
    let reason = if approved { None } else { normalize_text(reason) };
    let status = if approved {
      ProductStatus::Approved
    } else {
      ProductStatus::Rejected
    };

    let mut patch = json!({ "status": status, "rejectionReason": reason });
    stamp(&mut patch, &["updatedAt"]);
    self.state.store().update(collections::PRODUCTS, product_id, patch).await?;

    event!(Level::INFO, product_id, vendor_id = %product.vendor_id, approved, "Product moderated.");
    self.state.events.publish(DomainEvent::ProductModerated {
      product_id: product.id.clone(),
      vendor_id: product.vendor_id.clone(),
      product_name: product.name.clone(),
      approved,
      reason,
    });
    self.get_product(product_id).await
  }
}
