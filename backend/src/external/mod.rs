//! External API integrations

pub mod cdn;
pub mod email;
pub mod payment;
pub mod push;

pub use cdn::CdnClient;
pub use email::EmailClient;
pub use payment::PaymentClient;
pub use push::PushClient;
