pub mod backend;
pub mod payment;
pub mod session;

pub use backend::{AuthApi, BackendError, BookingBackend, GuestLogin};
pub use payment::{PaymentGateway, PaymentMethod, PaymentOutcome, PaymentStatus};
pub use session::{HotelRef, SessionError, SessionStore, StoredToken, TokenKind};
