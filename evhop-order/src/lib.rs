pub mod models;
pub mod finance;
pub mod invoice;
pub mod schedule;
pub mod contact;
pub mod wizard;
pub mod driver;
pub mod poller;

pub use models::{BookingDraft, BookingForm, BookingType, Destination, RentalFields, VehicleOption};
pub use finance::{tier_for, CommissionSummary, Tier, TierName, TIERS};
pub use invoice::{HtmlInvoiceRenderer, InvoiceRenderer};
pub use wizard::{BookingWizard, Command, Step, WizardContext, WizardError, WizardEvent, WizardPhase};
pub use driver::WizardDriver;
pub use poller::{backoff_delay, PaymentPoller, PollHandle};
