//! Business logic services for the Mercato Marketplace Platform

pub mod auth;
pub mod commission;
pub mod coupon;
pub mod notification;
pub mod order;
pub mod payment;
pub mod producer;
pub mod product;
pub mod review;

pub use auth::AuthService;
pub use commission::CommissionService;
pub use coupon::CouponService;
pub use notification::NotificationService;
pub use order::OrderService;
pub use payment::PaymentService;
pub use producer::ProducerService;
pub use product::ProductService;
pub use review::ReviewService;
