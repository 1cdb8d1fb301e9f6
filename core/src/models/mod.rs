// core/src/models/mod.rs

//! Persisted document shapes. Field names serialise in camelCase; `None`
//! serialises as an explicit `null`.

pub mod catalog;
pub mod ledger;
pub mod money;
pub mod notification;
pub mod order;
pub mod payout;
pub mod review;
pub mod status;
pub mod vendor;

pub use catalog::{Product, ProductStatus, User, UserRole};
pub use ledger::{BalanceReconciliation, LedgerEntry, LedgerEntryKind};
pub use notification::{NewNotification, Notification, NotificationKind, Template};
pub use order::{
  Address, CancellationRecord, CheckoutItem, CheckoutRequest, Order, OrderItem, ReturnRequest, Settlement,
  VendorOrder,
};
pub use payout::{Payout, PayoutRequest, PayoutStatus};
pub use review::{ModerationDecision, RatingAggregate, Review, ReviewInput, ReviewSubject, VendorReply};
pub use status::{OrderStatus, PaymentStatus, ReviewStatus, SubOrderStatus, VendorStatus};
pub use vendor::{
  BankDetails, Vendor, VendorCustomer, VendorGroup, VendorProfileUpdate, VendorRegistration, VendorSelector,
  VendorStats,
};
