//! Multi-step booking wizard
//!
//! The wizard walks Service → Date → Time → Details → Review → Submitted.
//! Each selection is checked against the catalog and availability rules
//! before the wizard advances. Picking something at an earlier step again
//! discards every later choice.

use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::CreateBookingInput;
use crate::site::availability::AvailabilityRules;
use crate::site::catalog::{find_service, ServiceOffering};

pub const MAX_MESSAGE_CHARS: usize = 2000;
const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s.]+(\.[^@\s.]+)+$").expect("email pattern is valid"));
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9 +\-().]+$").expect("phone pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WizardStep {
    Service,
    Date,
    Time,
    Details,
    Review,
    Submitted,
}

impl WizardStep {
    fn previous(self) -> Self {
        match self {
            WizardStep::Service | WizardStep::Date => WizardStep::Service,
            WizardStep::Time => WizardStep::Date,
            WizardStep::Details => WizardStep::Time,
            WizardStep::Review => WizardStep::Details,
            WizardStep::Submitted => WizardStep::Submitted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WizardError {
    #[error("Cannot {action} at step {step:?}")]
    WrongStep { action: &'static str, step: WizardStep },

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Date is not available: {0}")]
    DateUnavailable(NaiveDate),

    #[error("Time is not available: {0}")]
    TimeUnavailable(NaiveTime),

    #[error("Invalid {field}: {reason}")]
    InvalidDetails { field: &'static str, reason: String },
}

/// Contact details entered at the `Details` step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl BookingDetails {
    /// Trimmed copy with an empty message collapsed to `None`, or the first
    /// field that fails validation
    pub fn validated(&self) -> Result<BookingDetails, WizardError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(invalid("name", "must not be empty"));
        }

        let email = self.email.trim();
        if !is_valid_email(email) {
            return Err(invalid("email", "must look like name@example.com"));
        }

        let phone = self.phone.trim();
        if !is_valid_phone(phone) {
            return Err(invalid(
                "phone",
                format!("must contain {} to {} digits", MIN_PHONE_DIGITS, MAX_PHONE_DIGITS),
            ));
        }

        let message = self
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());
        if message.is_some_and(|m| m.chars().count() > MAX_MESSAGE_CHARS) {
            return Err(invalid(
                "message",
                format!("must be at most {} characters", MAX_MESSAGE_CHARS),
            ));
        }

        Ok(BookingDetails {
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            message: message.map(str::to_string),
        })
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> WizardError {
    WizardError::InvalidDetails {
        field,
        reason: reason.into(),
    }
}

/// One `@`, a non-empty local part and a dotted domain, no whitespace
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Digits plus common separators, with 7 to 15 digits in total
pub fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    PHONE_RE.is_match(phone) && (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits)
}

/// A complete booking as posted by the public booking page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub service: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl From<&CreateBookingInput> for BookingRequest {
    fn from(input: &CreateBookingInput) -> Self {
        Self {
            service: input.service.clone(),
            date: input.date,
            time: input.time,
            name: input.customer_name.clone(),
            email: input.email.clone(),
            phone: input.phone.clone(),
            message: input.message.clone(),
        }
    }
}

impl From<BookingRequest> for CreateBookingInput {
    fn from(request: BookingRequest) -> Self {
        Self {
            customer_name: request.name,
            email: request.email,
            phone: request.phone,
            service: request.service,
            message: request.message,
            date: request.date,
            time: request.time,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BookingWizard<'r> {
    rules: &'r AvailabilityRules,
    today: NaiveDate,
    step: WizardStep,
    service: Option<&'static ServiceOffering>,
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    details: Option<BookingDetails>,
}

impl<'r> BookingWizard<'r> {
    pub fn new(rules: &'r AvailabilityRules, today: NaiveDate) -> Self {
        Self {
            rules,
            today,
            step: WizardStep::Service,
            service: None,
            date: None,
            time: None,
            details: None,
        }
    }

    /// Run a complete request through every step
    pub fn replay(
        rules: &'r AvailabilityRules,
        today: NaiveDate,
        request: &BookingRequest,
    ) -> Result<CreateBookingInput, WizardError> {
        let mut wizard = Self::new(rules, today);
        wizard.select_service(&request.service)?;
        wizard.select_date(request.date)?;
        wizard.select_time(request.time)?;
        wizard.fill_details(BookingDetails {
            name: request.name.clone(),
            email: request.email.clone(),
            phone: request.phone.clone(),
            message: request.message.clone(),
        })?;
        wizard.submit()
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn service(&self) -> Option<&'static ServiceOffering> {
        self.service
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn time(&self) -> Option<NaiveTime> {
        self.time
    }

    pub fn details(&self) -> Option<&BookingDetails> {
        self.details.as_ref()
    }

    /// Dates to offer at the `Date` step
    pub fn date_options(&self) -> Vec<NaiveDate> {
        self.service
            .map(|s| self.rules.available_dates(s, self.today))
            .unwrap_or_default()
    }

    /// Times to offer at the `Time` step
    pub fn time_options(&self) -> Vec<NaiveTime> {
        match (self.service, self.date) {
            (Some(service), Some(date)) => self.rules.available_times(service, date, self.today),
            _ => Vec::new(),
        }
    }

    fn ensure_reached(&self, step: WizardStep, action: &'static str) -> Result<(), WizardError> {
        if self.step < step || self.step == WizardStep::Submitted {
            return Err(WizardError::WrongStep {
                action,
                step: self.step,
            });
        }
        Ok(())
    }

    pub fn select_service(&mut self, id: &str) -> Result<(), WizardError> {
        self.ensure_reached(WizardStep::Service, "select a service")?;
        let service = find_service(id).ok_or_else(|| WizardError::UnknownService(id.to_string()))?;

        self.service = Some(service);
        self.date = None;
        self.time = None;
        self.details = None;
        self.step = WizardStep::Date;
        Ok(())
    }

    pub fn select_date(&mut self, date: NaiveDate) -> Result<(), WizardError> {
        self.ensure_reached(WizardStep::Date, "select a date")?;
        let service = self.service.ok_or(WizardError::WrongStep {
            action: "select a date",
            step: self.step,
        })?;
        if !self.rules.is_date_available(service, date, self.today) {
            return Err(WizardError::DateUnavailable(date));
        }

        self.date = Some(date);
        self.time = None;
        self.details = None;
        self.step = WizardStep::Time;
        Ok(())
    }

    pub fn select_time(&mut self, time: NaiveTime) -> Result<(), WizardError> {
        self.ensure_reached(WizardStep::Time, "select a time")?;
        let (Some(service), Some(date)) = (self.service, self.date) else {
            return Err(WizardError::WrongStep {
                action: "select a time",
                step: self.step,
            });
        };
        if !self.rules.is_slot_available(service, date, time, self.today) {
            return Err(WizardError::TimeUnavailable(time));
        }

        self.time = Some(time);
        self.details = None;
        self.step = WizardStep::Details;
        Ok(())
    }

    pub fn fill_details(&mut self, details: BookingDetails) -> Result<(), WizardError> {
        self.ensure_reached(WizardStep::Details, "enter details")?;
        self.details = Some(details.validated()?);
        self.step = WizardStep::Review;
        Ok(())
    }

    /// Confirm the reviewed booking
    pub fn submit(&mut self) -> Result<CreateBookingInput, WizardError> {
        let wrong_step = WizardError::WrongStep {
            action: "submit",
            step: self.step,
        };
        if self.step != WizardStep::Review {
            return Err(wrong_step);
        }
        let (Some(service), Some(date), Some(time), Some(details)) =
            (self.service, self.date, self.time, self.details.clone())
        else {
            return Err(wrong_step);
        };

        self.step = WizardStep::Submitted;
        Ok(CreateBookingInput {
            customer_name: details.name,
            email: details.email,
            phone: details.phone,
            service: service.id.to_string(),
            message: details.message,
            date,
            time,
        })
    }

    /// Go back one step, keeping earlier choices
    pub fn back(&mut self) -> Result<WizardStep, WizardError> {
        if self.step == WizardStep::Submitted {
            return Err(WizardError::WrongStep {
                action: "go back",
                step: self.step,
            });
        }
        self.step = self.step.previous();
        Ok(self.step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Monday
    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 3, 4).unwrap()
    }

    fn tuesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 3, 5).unwrap()
    }

    fn ten() -> NaiveTime {
        NaiveTime::from_hms_opt(10, 0, 0).unwrap()
    }

    fn details() -> BookingDetails {
        BookingDetails {
            name: " Ada Lovelace ".into(),
            email: "ada@example.com".into(),
            phone: "+44 (20) 7946-0000".into(),
            message: Some("  ".into()),
        }
    }

    #[test]
    fn test_happy_path() {
        let rules = AvailabilityRules::default();
        let mut wizard = BookingWizard::new(&rules, today());
        assert_eq!(wizard.step(), WizardStep::Service);

        wizard.select_service("individual-counseling").unwrap();
        assert_eq!(wizard.step(), WizardStep::Date);
        assert!(wizard.date_options().contains(&tuesday()));

        wizard.select_date(tuesday()).unwrap();
        assert!(wizard.time_options().contains(&ten()));

        wizard.select_time(ten()).unwrap();
        wizard.fill_details(details()).unwrap();
        assert_eq!(wizard.step(), WizardStep::Review);

        let input = wizard.submit().unwrap();
        assert_eq!(wizard.step(), WizardStep::Submitted);
        assert_eq!(input.customer_name, "Ada Lovelace");
        assert_eq!(input.service, "individual-counseling");
        assert_eq!(input.message, None);
        assert_eq!(input.date, tuesday());
        assert_eq!(input.time, ten());
    }

    #[test]
    fn test_steps_out_of_order_rejected() {
        let rules = AvailabilityRules::default();
        let mut wizard = BookingWizard::new(&rules, today());

        assert!(matches!(wizard.select_date(tuesday()), Err(WizardError::WrongStep { .. })));
        assert!(matches!(wizard.submit(), Err(WizardError::WrongStep { .. })));
        assert!(matches!(
            wizard.select_service("tarot"),
            Err(WizardError::UnknownService(_))
        ));
    }

    #[test]
    fn test_unavailable_choices_rejected() {
        let rules = AvailabilityRules::default();
        let mut wizard = BookingWizard::new(&rules, today());
        wizard.select_service("leadership-coaching").unwrap();

        let saturday = NaiveDate::from_ymd_opt(2030, 3, 9).unwrap();
        assert_eq!(wizard.select_date(saturday), Err(WizardError::DateUnavailable(saturday)));
        assert_eq!(wizard.select_date(today()), Err(WizardError::DateUnavailable(today())));

        wizard.select_date(tuesday()).unwrap();
        let late = NaiveTime::from_hms_opt(16, 30, 0).unwrap();
        assert_eq!(wizard.select_time(late), Err(WizardError::TimeUnavailable(late)));
        assert_eq!(wizard.step(), WizardStep::Time);
    }

    #[test]
    fn test_reselecting_discards_later_choices() {
        let rules = AvailabilityRules::default();
        let mut wizard = BookingWizard::new(&rules, today());
        wizard.select_service("individual-counseling").unwrap();
        wizard.select_date(tuesday()).unwrap();
        wizard.select_time(ten()).unwrap();
        wizard.fill_details(details()).unwrap();

        wizard.select_service("couples-counseling").unwrap();
        assert_eq!(wizard.step(), WizardStep::Date);
        assert!(wizard.date().is_none());
        assert!(wizard.time().is_none());
        assert!(wizard.details().is_none());
    }

    #[test]
    fn test_back() {
        let rules = AvailabilityRules::default();
        let mut wizard = BookingWizard::new(&rules, today());
        assert_eq!(wizard.back().unwrap(), WizardStep::Service);

        wizard.select_service("individual-counseling").unwrap();
        wizard.select_date(tuesday()).unwrap();
        assert_eq!(wizard.back().unwrap(), WizardStep::Date);
        assert_eq!(wizard.date(), Some(tuesday()));

        wizard.select_date(tuesday()).unwrap();
        wizard.select_time(ten()).unwrap();
        wizard.fill_details(details()).unwrap();
        wizard.submit().unwrap();
        assert!(wizard.back().is_err());
        assert!(wizard.select_service("individual-counseling").is_err());
    }

    #[test]
    fn test_details_validation() {
        let ok = details();
        assert!(ok.validated().is_ok());

        let cases = [
            (BookingDetails { name: "  ".into(), ..ok.clone() }, "name"),
            (BookingDetails { email: "ada@@example.com".into(), ..ok.clone() }, "email"),
            (BookingDetails { email: "ada@example".into(), ..ok.clone() }, "email"),
            (BookingDetails { phone: "12345".into(), ..ok.clone() }, "phone"),
            (BookingDetails { phone: "1234567890123456".into(), ..ok.clone() }, "phone"),
            (BookingDetails { phone: "call me 5551234".into(), ..ok.clone() }, "phone"),
            (
                BookingDetails { message: Some("x".repeat(MAX_MESSAGE_CHARS + 1)), ..ok.clone() },
                "message",
            ),
        ];
        for (input, expected) in cases {
            match input.validated() {
                Err(WizardError::InvalidDetails { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected invalid {}, got {:?}", expected, other),
            }
        }

        let max = BookingDetails { message: Some("é".repeat(MAX_MESSAGE_CHARS)), ..ok };
        assert!(max.validated().is_ok());
    }

    #[test]
    fn test_email_rules() {
        assert!(is_valid_email("a.b@example.co.uk"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a@.com"));
        assert!(!is_valid_email("a@example."));
        assert!(!is_valid_email("a b@example.com"));
        assert!(!is_valid_email("a@b@example.com"));
    }

    #[test]
    fn test_replay_matches_stepwise_flow() {
        let rules = AvailabilityRules::default();
        let request = BookingRequest {
            service: "individual-counseling".into(),
            date: tuesday(),
            time: ten(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            phone: "5550100200".into(),
            message: Some("Hello".into()),
        };
        let input = BookingWizard::replay(&rules, today(), &request).unwrap();
        assert_eq!(BookingRequest::from(&input), request);

        let bad = BookingRequest { time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(), ..request };
        assert!(matches!(
            BookingWizard::replay(&rules, today(), &bad),
            Err(WizardError::TimeUnavailable(_))
        ));
    }
}
