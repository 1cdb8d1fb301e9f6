// core/src/services/notifications.rs

//! In-app notifications: the per-user inbox and the dispatcher that fills it
//! from domain events.

use crate::error::{MarketError, MarketResult};
use crate::events::{DomainEvent, EventStream};
use crate::models::{NewNotification, Notification, OrderStatus, SubOrderStatus, Template, User, UserRole, VendorStatus};
use crate::state::MarketState;
use crate::store::{collections, fetch, fetch_all, stamp, to_document, Direction, Query, WriteOp};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{event, instrument, Level};

#[derive(Clone, Debug)]
pub struct NotificationService {
  state: MarketState,
}

impl NotificationService {
  pub fn new(state: MarketState) -> Self {
    Self { state }
  }

  #[instrument(name = "NotificationService::create", skip_all, fields(user_id = %new.user_id, kind = ?new.kind), err(Display))]
  pub async fn create(&self, new: NewNotification) -> MarketResult<Notification> {
    if new.user_id.trim().is_empty() {
      return Err(MarketError::validation("notification recipient is required"));
    }
    let notification = Notification {
      id: uuid::Uuid::new_v4().to_string(),
      user_id: new.user_id,
      kind: new.kind,
      title: new.title,
      message: new.message,
      link: new.link,
      read: false,
      created_at: None,
    };
    let mut body = to_document(&notification)?;
    stamp(&mut body, &["createdAt"]);
    self
      .state
      .store()
      .atomic_batch(vec![WriteOp::insert(collections::NOTIFICATIONS, &notification.id, body)])
      .await?;
    fetch(self.state.store(), collections::NOTIFICATIONS, "notification", &notification.id).await
  }

  /// Newest first.
  pub async fn list_for_user(&self, user_id: &str, unread_only: bool) -> MarketResult<Vec<Notification>> {
    let mut query = Query::new().where_eq("userId", user_id);
    if unread_only {
      query = query.where_eq("read", false);
    }
    fetch_all(
      self.state.store(),
      collections::NOTIFICATIONS,
      &query.order_by("createdAt", Direction::Desc),
    )
    .await
  }

  pub async fn mark_read(&self, notification_id: &str) -> MarketResult<()> {
    fetch::<Notification>(self.state.store(), collections::NOTIFICATIONS, "notification", notification_id).await?;
    self
      .state
      .store()
      .update(collections::NOTIFICATIONS, notification_id, json!({ "read": true }))
      .await?;
    Ok(())
  }

  /// Returns how many notifications changed.
  pub async fn mark_all_read(&self, user_id: &str) -> MarketResult<usize> {
    let unread = self.list_for_user(user_id, true).await?;
    if unread.is_empty() {
      return Ok(0);
    }
    let ops = unread
      .iter()
      .map(|n| WriteOp::update(collections::NOTIFICATIONS, &n.id, json!({ "read": true })))
      .collect();
    self.state.store().atomic_batch(ops).await?;
    Ok(unread.len())
  }

  pub async fn delete(&self, notification_id: &str) -> MarketResult<()> {
    fetch::<Notification>(self.state.store(), collections::NOTIFICATIONS, "notification", notification_id).await?;
    self.state.store().delete(collections::NOTIFICATIONS, notification_id).await?;
    Ok(())
  }

  pub async fn delete_all(&self, user_id: &str) -> MarketResult<usize> {
    let all = self.list_for_user(user_id, false).await?;
    if all.is_empty() {
      return Ok(0);
    }
    let ops = all
      .iter()
      .map(|n| WriteOp::delete(collections::NOTIFICATIONS, &n.id))
      .collect();
    self.state.store().atomic_batch(ops).await?;
    Ok(all.len())
  }
}

/// Turns domain events into notifications. Every failure is logged and
/// dropped; nothing here reaches the operation that published the event.
#[derive(Clone, Debug)]
pub struct NotificationDispatcher {
  state: MarketState,
  inbox: NotificationService,
}

impl NotificationDispatcher {
  pub fn new(state: MarketState) -> Self {
    Self {
      inbox: NotificationService::new(state.clone()),
      state,
    }
  }

  async fn admin_ids(&self) -> Vec<String> {
    let query = Query::new().where_eq("role", json!(UserRole::Admin));
    match fetch_all::<User>(self.state.store(), collections::USERS, &query).await {
      Ok(admins) => admins.into_iter().map(|u| u.id).collect(),
      Err(e) => {
        event!(Level::WARN, error = %e, "Could not look up admins; admin notifications skipped.");
        Vec::new()
      }
    }
  }

  /// The user who owns a vendor record. Vendors are keyed by owner, so the
  /// vendor id is the fallback.
  async fn vendor_owner(&self, vendor_id: &str) -> String {
    match self.state.store().get(collections::VENDORS, vendor_id).await {
      Ok(Some(doc)) => doc
        .body
        .get("userId")
        .and_then(|v| v.as_str())
        .filter(|v| !v.is_empty())
        .unwrap_or(vendor_id)
        .to_string(),
      _ => vendor_id.to_string(),
    }
  }

  async fn render(&self, domain_event: &DomainEvent) -> Vec<NewNotification> {
    let mut out = Vec::new();
    match domain_event {
      DomainEvent::OrderPlaced {
        order_id,
        order_number,
        customer_id,
        total,
        vendors,
      } => {
        out.push(
          Template::OrderPlaced {
            order_id,
            order_number,
            total: *total,
          }
          .render(customer_id),
        );
        for share in vendors {
          let owner = self.vendor_owner(&share.vendor_id).await;
          out.push(
            Template::VendorNewOrder {
              order_id,
              order_number,
              subtotal: share.subtotal,
            }
            .render(&owner),
          );
        }
        for admin in self.admin_ids().await {
          out.push(
            Template::AdminNewOrder {
              order_id,
              order_number,
              total: *total,
            }
            .render(&admin),
          );
        }
      }
      DomainEvent::SubOrderStatusChanged {
        order_id,
        order_number,
        customer_id,
        vendor_name,
        to,
        ..
      } => {
        let vendor_name = vendor_name.as_deref();
        let template = match to {
          SubOrderStatus::Shipped => Some(Template::OrderShipped {
            order_id,
            order_number,
            vendor_name,
          }),
          SubOrderStatus::Delivered => Some(Template::OrderDelivered {
            order_id,
            order_number,
            vendor_name,
          }),
          SubOrderStatus::Cancelled => Some(Template::OrderCancelled {
            order_id,
            order_number,
            reason: None,
          }),
          _ => None,
        };
        out.extend(template.map(|t| t.render(customer_id)));
      }
      DomainEvent::OrderStatusChanged {
        order_id,
        order_number,
        customer_id,
        to,
        ..
      } => {
        let template = match to {
          OrderStatus::Shipped => Some(Template::OrderShipped {
            order_id,
            order_number,
            vendor_name: None,
          }),
          OrderStatus::Delivered => Some(Template::OrderDelivered {
            order_id,
            order_number,
            vendor_name: None,
          }),
          _ => None,
        };
        out.extend(template.map(|t| t.render(customer_id)));
      }
      DomainEvent::OrderCancelled {
        order_id,
        order_number,
        customer_id,
        reason,
        ..
      } => {
        out.push(
          Template::OrderCancelled {
            order_id,
            order_number,
            reason: reason.as_deref(),
          }
          .render(customer_id),
        );
      }
      DomainEvent::VendorRegistered { vendor_id, business_name } => {
        for admin in self.admin_ids().await {
          out.push(Template::AdminNewVendor { vendor_id, business_name }.render(&admin));
        }
      }
      DomainEvent::VendorStatusChanged {
        vendor_id,
        business_name,
        to,
        ..
      } => {
        let template = match to {
          VendorStatus::Suspended => Some(Template::VendorSuspended { business_name }),
          VendorStatus::Approved => Some(Template::VendorActivated { business_name }),
          _ => None,
        };
        if let Some(template) = template {
          let owner = self.vendor_owner(vendor_id).await;
          out.push(template.render(&owner));
        }
      }
      DomainEvent::ProductModerated {
        product_id,
        vendor_id,
        product_name,
        approved,
        reason,
      } => {
        let owner = self.vendor_owner(vendor_id).await;
        let template = if *approved {
          Template::ProductApproved { product_id, product_name }
        } else {
          Template::ProductRejected {
            product_id,
            product_name,
            reason: reason.as_deref(),
          }
        };
        out.push(template.render(&owner));
      }
      DomainEvent::ReviewSubmitted {
        review_id,
        vendor_id,
        rating,
        ..
      } => {
        let owner = self.vendor_owner(vendor_id).await;
        out.push(Template::NewReview { review_id, rating: *rating }.render(&owner));
      }
      DomainEvent::ReturnRequested { .. } | DomainEvent::PayoutRequested { .. } => {}
    }
    out
  }

  /// Stores the notifications for one event. Returns how many were written.
  pub async fn handle(&self, domain_event: &DomainEvent) -> usize {
    let mut written = 0;
    for notification in self.render(domain_event).await {
      let user_id = notification.user_id.clone();
      match self.inbox.create(notification).await {
        Ok(_) => written += 1,
        Err(e) => {
          event!(Level::WARN, event = domain_event.name(), %user_id, error = %e, "Notification dropped.");
        }
      }
    }
    event!(Level::DEBUG, event = domain_event.name(), written, "Event dispatched.");
    written
  }

  /// Consumes `stream` until it closes or `shutdown` fires.
  pub async fn run(self, mut stream: EventStream, shutdown: CancellationToken) {
    event!(Level::INFO, "Notification dispatcher started.");
    loop {
      tokio::select! {
        _ = shutdown.cancelled() => {
          event!(Level::INFO, "Notification dispatcher shutting down.");
          break;
        }
        next = stream.recv() => {
          match next {
            Some(domain_event) => {
              self.handle(&domain_event).await;
            }
            None => {
              event!(Level::INFO, "Event stream closed.");
              break;
            }
          }
        }
      }
    }
    // Whatever was published before shutdown still gets delivered.
    for domain_event in stream.drain() {
      self.handle(&domain_event).await;
    }
    event!(Level::INFO, "Notification dispatcher stopped.");
  }

  pub fn spawn(self, stream: EventStream, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(self.run(stream, shutdown))
  }
}
