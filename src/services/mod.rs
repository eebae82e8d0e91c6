pub mod auth_service;
pub mod enrollment_service;
pub mod maintenance_service;
pub mod notification_service;
pub mod payment_service;
pub mod store;
pub mod user_service;

#[cfg(test)]
pub mod memory_store;

pub use notification_service::{Notifier, SmtpNotifier};
pub use store::Store;
