// server/src/web/routes.rs

use actix_web::web;

use super::handlers::{catalog, notifications, orders, reviews, vendors};

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .app_data(super::query_config())
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/orders")
          .route("", web::post().to(orders::create_order_handler))
          .route("", web::get().to(orders::list_orders_handler))
          .route("/mine", web::get().to(orders::list_my_orders_handler))
          .route("/{order_id}", web::get().to(orders::get_order_handler))
          .route("/{order_id}/status", web::patch().to(orders::update_status_handler))
          .route("/{order_id}/tracking", web::post().to(orders::add_tracking_handler))
          .route("/{order_id}/cancel", web::post().to(orders::cancel_order_handler))
          .route("/{order_id}/return", web::post().to(orders::request_return_handler))
          .route("/{order_id}/payment", web::patch().to(orders::update_payment_handler)),
      )
      .service(
        web::scope("/vendors")
          .route("", web::post().to(vendors::register_vendor_handler))
          .route("", web::get().to(vendors::list_vendors_handler))
          .route("/stats", web::get().to(vendors::multi_vendor_stats_handler))
          .route("/{vendor_id}", web::get().to(vendors::get_vendor_handler))
          .route("/{vendor_id}", web::patch().to(vendors::update_profile_handler))
          .route("/{vendor_id}/status", web::patch().to(vendors::update_status_handler))
          .route("/{vendor_id}/commission", web::put().to(vendors::set_commission_handler))
          .route("/{vendor_id}/orders", web::get().to(vendors::vendor_orders_handler))
          .route("/{vendor_id}/customers", web::get().to(vendors::vendor_customers_handler))
          .route("/{vendor_id}/stats", web::get().to(vendors::vendor_stats_handler))
          .route("/{vendor_id}/payouts", web::post().to(vendors::request_payout_handler))
          .route("/{vendor_id}/payouts", web::get().to(vendors::list_payouts_handler))
          .route("/{vendor_id}/ledger", web::get().to(vendors::ledger_entries_handler))
          .route("/{vendor_id}/reconciliation", web::get().to(vendors::reconcile_handler))
          .route("/{vendor_id}/products", web::get().to(catalog::vendor_products_handler))
          .route("/{vendor_id}/reviews", web::get().to(reviews::store_reviews_handler))
          .route("/{vendor_id}/reviews/all", web::get().to(reviews::vendor_reviews_handler)),
      )
      .service(
        web::scope("/vendor-groups")
          .route("", web::get().to(vendors::list_groups_handler))
          .route("/{group_id}", web::get().to(vendors::get_group_handler))
          .route("/{group_id}", web::put().to(vendors::put_group_handler))
          .route("/{group_id}", web::delete().to(vendors::delete_group_handler))
          .route("/{group_id}/stats", web::get().to(vendors::group_stats_handler)),
      )
      .service(
        web::scope("/products")
          .route("/{product_id}", web::get().to(catalog::get_product_handler))
          .route("/{product_id}/moderation", web::post().to(catalog::moderate_product_handler))
          .route("/{product_id}/reviews", web::get().to(reviews::product_reviews_handler)),
      )
      .service(
        web::scope("/reviews")
          .route("", web::post().to(reviews::submit_review_handler))
          .route("", web::get().to(reviews::list_reviews_handler))
          .route("/mine", web::get().to(reviews::my_reviews_handler))
          .route("/reconcile", web::post().to(reviews::reconcile_ratings_handler))
          .route("/{review_id}", web::get().to(reviews::get_review_handler))
          .route("/{review_id}", web::delete().to(reviews::delete_review_handler))
          .route("/{review_id}/status", web::patch().to(reviews::update_status_handler))
          .route("/{review_id}/reply", web::post().to(reviews::reply_handler))
          .route("/{review_id}/helpful", web::post().to(reviews::helpful_handler)),
      )
      .service(
        web::scope("/notifications")
          .route("", web::get().to(notifications::list_handler))
          .route("", web::delete().to(notifications::delete_all_handler))
          .route("/read-all", web::post().to(notifications::mark_all_read_handler))
          .route("/{notification_id}/read", web::post().to(notifications::mark_read_handler))
          .route("/{notification_id}", web::delete().to(notifications::delete_handler)),
      ),
  );
}
