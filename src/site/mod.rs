//! Public site logic
//!
//! Static service catalog, booking availability rules and the booking
//! wizard state machine.

pub mod availability;
pub mod catalog;
pub mod wizard;

pub use availability::AvailabilityRules;
pub use catalog::{find_service, ServiceKind, ServiceOffering, SERVICES};
pub use wizard::{
    is_valid_email, is_valid_phone, BookingDetails, BookingRequest, BookingWizard, WizardError, WizardStep,
};
