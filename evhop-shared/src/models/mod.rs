pub mod admin;
pub mod booking;

pub use admin::{Payout, PayoutStatus, ServiceType, Transaction};
pub use booking::{CarOption, UserProfile};
