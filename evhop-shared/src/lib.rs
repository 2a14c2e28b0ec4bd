pub mod money;
pub mod pii;
pub mod models;

pub use money::{format_rupiah, Rupiah};
pub use pii::Masked;
