use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::planning::PlanningError;

/// Acceptance status of an invitation. The wire carries it as a nullable
/// boolean: null = pending, true = accepted, false = declined. No operation
/// in this crate writes a status other than the pending default; accept and
/// decline happen out-of-band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

impl InvitationStatus {
    pub fn from_wire(value: Option<bool>) -> Self {
        match value {
            None => Self::Pending,
            Some(true) => Self::Accepted,
            Some(false) => Self::Declined,
        }
    }

    pub fn to_wire(self) -> Option<bool> {
        match self {
            Self::Pending => None,
            Self::Accepted => Some(true),
            Self::Declined => Some(false),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }
}

impl std::fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Link between exactly one event and exactly one association. At most one
/// invitation exists per (event, association) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: i64,
    pub event_id: i64,
    pub association_id: i64,
    pub status: InvitationStatus,
}

impl Invitation {
    pub fn pending(id: i64, event_id: i64, association_id: i64) -> Self {
        Self {
            id,
            event_id,
            association_id,
            status: InvitationStatus::Pending,
        }
    }
}

/// Who an invitation is addressed to: an existing association by id, or a
/// bare email address (resolved or auto-created by name at add time).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteTarget {
    Association(i64),
    Email(String),
}

impl InviteTarget {
    /// Validates the request-level rule that exactly one of the two fields
    /// is supplied, and that a supplied email has a plausible shape.
    pub fn from_request(
        association_id: Option<i64>,
        email: Option<&str>,
    ) -> Result<Self, PlanningError> {
        let email = email.map(str::trim).filter(|e| !e.is_empty());
        match (association_id, email) {
            (Some(_), Some(_)) => Err(PlanningError::InvalidInput(
                "Supply either an association id or an email, not both".to_string(),
            )),
            (Some(id), None) => Ok(Self::Association(id)),
            (None, Some(email)) => {
                if !is_valid_email(email) {
                    return Err(PlanningError::InvalidInput(format!(
                        "Malformed email '{}'",
                        email
                    )));
                }
                Ok(Self::Email(email.to_string()))
            }
            (None, None) => Err(PlanningError::InvalidInput(
                "An association id or an email is required".to_string(),
            )),
        }
    }
}

pub fn is_valid_email(value: &str) -> bool {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("invalid email regex")
    });
    regex.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_wire_form() {
        assert_eq!(InvitationStatus::from_wire(None), InvitationStatus::Pending);
        assert_eq!(
            InvitationStatus::from_wire(Some(true)),
            InvitationStatus::Accepted
        );
        assert_eq!(
            InvitationStatus::from_wire(Some(false)),
            InvitationStatus::Declined
        );

        assert_eq!(InvitationStatus::Pending.to_wire(), None);
        assert_eq!(InvitationStatus::Accepted.to_wire(), Some(true));
        assert_eq!(InvitationStatus::Declined.to_wire(), Some(false));
    }

    #[test]
    fn status_displays_lowercase_labels() {
        assert_eq!(InvitationStatus::Pending.to_string(), "pending");
        assert_eq!(InvitationStatus::Declined.to_string(), "declined");
    }

    #[test]
    fn target_requires_exactly_one_field() {
        let both = InviteTarget::from_request(Some(1), Some("a@b.fr"));
        let neither = InviteTarget::from_request(None, None);

        assert!(matches!(both, Err(PlanningError::InvalidInput(_))));
        assert!(matches!(neither, Err(PlanningError::InvalidInput(_))));
    }

    #[test]
    fn target_accepts_association_id_alone() {
        let target = InviteTarget::from_request(Some(5), None).unwrap();
        assert_eq!(target, InviteTarget::Association(5));
    }

    #[test]
    fn target_trims_and_accepts_valid_email() {
        let target = InviteTarget::from_request(None, Some("  contact@example.org ")).unwrap();
        assert_eq!(target, InviteTarget::Email("contact@example.org".to_string()));
    }

    #[test]
    fn blank_email_counts_as_missing() {
        let result = InviteTarget::from_request(None, Some("   "));
        assert!(matches!(result, Err(PlanningError::InvalidInput(_))));
    }

    #[test]
    fn malformed_email_is_rejected() {
        for bad in ["plainaddress", "no@dots", "two words@mail.fr", "@mail.fr"] {
            let result = InviteTarget::from_request(None, Some(bad));
            assert!(
                matches!(result, Err(PlanningError::InvalidInput(_))),
                "expected rejection for '{}'",
                bad
            );
        }
    }

    #[test]
    fn ordinary_addresses_pass_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("prenom.nom@asso.fr"));
    }
}
