//! Services offered by the practice

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Counseling,
    CorporateTraining,
}

impl ServiceKind {
    pub fn label(&self) -> &'static str {
        match self {
            ServiceKind::Counseling => "Counseling",
            ServiceKind::CorporateTraining => "Corporate training",
        }
    }
}

/// A bookable service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceOffering {
    /// Stable identifier stored on bookings
    pub id: &'static str,
    pub name: &'static str,
    pub kind: ServiceKind,
    pub duration_minutes: u32,
    pub summary: &'static str,
    /// Corporate sessions only run Monday to Friday
    pub weekdays_only: bool,
}

pub static SERVICES: &[ServiceOffering] = &[
    ServiceOffering {
        id: "individual-counseling",
        name: "Individual Counseling",
        kind: ServiceKind::Counseling,
        duration_minutes: 50,
        summary: "One-to-one sessions for stress, anxiety, grief and life transitions.",
        weekdays_only: false,
    },
    ServiceOffering {
        id: "couples-counseling",
        name: "Couples Counseling",
        kind: ServiceKind::Counseling,
        duration_minutes: 80,
        summary: "Structured sessions to improve communication and work through conflict.",
        weekdays_only: false,
    },
    ServiceOffering {
        id: "family-counseling",
        name: "Family Counseling",
        kind: ServiceKind::Counseling,
        duration_minutes: 90,
        summary: "Sessions for families navigating change, conflict or loss together.",
        weekdays_only: false,
    },
    ServiceOffering {
        id: "leadership-coaching",
        name: "Leadership Coaching",
        kind: ServiceKind::CorporateTraining,
        duration_minutes: 60,
        summary: "Coaching for managers on feedback, delegation and resilient teams.",
        weekdays_only: true,
    },
    ServiceOffering {
        id: "wellbeing-workshop",
        name: "Workplace Wellbeing Workshop",
        kind: ServiceKind::CorporateTraining,
        duration_minutes: 180,
        summary: "A half-day workshop on stress management and psychological safety.",
        weekdays_only: true,
    },
    ServiceOffering {
        id: "team-training",
        name: "Team Communication Training",
        kind: ServiceKind::CorporateTraining,
        duration_minutes: 240,
        summary: "Hands-on training for teams on communication and conflict resolution.",
        weekdays_only: true,
    },
];

pub fn find_service(id: &str) -> Option<&'static ServiceOffering> {
    SERVICES.iter().find(|s| s.id == id)
}

pub fn services_of_kind(kind: ServiceKind) -> impl Iterator<Item = &'static ServiceOffering> {
    SERVICES.iter().filter(move |s| s.kind == kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_find_service() {
        let service = find_service("couples-counseling").expect("service exists");
        assert_eq!(service.kind, ServiceKind::Counseling);
        assert!(find_service("astrology").is_none());
    }

    #[test]
    fn test_ids_unique_and_durations_positive() {
        let ids: HashSet<_> = SERVICES.iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), SERVICES.len());
        assert!(SERVICES.iter().all(|s| s.duration_minutes > 0));
    }

    #[test]
    fn test_corporate_services_are_weekdays_only() {
        assert!(services_of_kind(ServiceKind::CorporateTraining).all(|s| s.weekdays_only));
        assert!(services_of_kind(ServiceKind::Counseling).count() >= 1);
    }
}
