//! Role-gated appointment status transitions.
//!
//! The table below is the only place transition rules live. Callers confirm
//! the actor is a participant of the appointment; this module only decides
//! whether the role may move the appointment to the requested status.

use shared_models::auth::ActorRole;

use crate::models::{Appointment, AppointmentStatus, TransitionError};

use AppointmentStatus::*;

const NONE: &[AppointmentStatus] = &[];

/// Reachable statuses, indexed by `[role][current status]`.
/// Rows follow `ActorRole::ALL`, columns follow `AppointmentStatus::ALL`.
static TRANSITIONS: [[&[AppointmentStatus]; 6]; 2] = [
    // Doctor
    [
        &[Scheduled, Cancelled],          // Requested
        &[InProgress, Cancelled, NoShow], // Scheduled
        &[Completed, Cancelled],          // InProgress
        NONE,                             // Completed
        NONE,                             // Cancelled
        NONE,                             // NoShow
    ],
    // Patient
    [
        &[Cancelled], // Requested
        &[Cancelled], // Scheduled
        NONE,         // InProgress
        NONE,         // Completed
        NONE,         // Cancelled
        NONE,         // NoShow
    ],
];

fn role_index(role: ActorRole) -> usize {
    match role {
        ActorRole::Doctor => 0,
        ActorRole::Patient => 1,
    }
}

/// Statuses `role` may move an appointment in `current` to.
pub fn allowed_transitions(role: ActorRole, current: AppointmentStatus) -> &'static [AppointmentStatus] {
    TRANSITIONS[role_index(role)][current.index()]
}

/// Return a copy of `appointment` in `requested`, or explain why `role`
/// may not make that change. The input is never modified.
pub fn apply_transition(
    appointment: &Appointment,
    role: ActorRole,
    requested: AppointmentStatus,
) -> Result<Appointment, TransitionError> {
    if !allowed_transitions(role, appointment.status).contains(&requested) {
        return Err(TransitionError::InvalidTransition {
            from: appointment.status,
            requested: requested.to_string(),
        });
    }

    Ok(Appointment {
        status: requested,
        ..appointment.clone()
    })
}

/// [`apply_transition`] over raw role and status strings, as they arrive
/// from tokens and request bodies.
pub fn apply_requested_transition(
    appointment: &Appointment,
    role: &str,
    requested: &str,
) -> Result<Appointment, TransitionError> {
    let role: ActorRole = role.parse()?;
    let status = parse_requested_status(appointment.status, requested)?;

    apply_transition(appointment, role, status)
}

/// Parse a requested status. An unrecognised value is reported as an
/// invalid transition out of `current`.
pub fn parse_requested_status(
    current: AppointmentStatus,
    requested: &str,
) -> Result<AppointmentStatus, TransitionError> {
    requested.parse().map_err(|_| TransitionError::InvalidTransition {
        from: current,
        requested: requested.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};
    use shared_models::auth::UnknownRole;
    use uuid::Uuid;

    use crate::models::AppointmentType;

    fn appointment(status: AppointmentStatus) -> Appointment {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            start_time: start,
            end_time: start + chrono::Duration::minutes(30),
            status,
            appointment_type: AppointmentType::Video,
            symptoms: Some("Headache".to_string()),
            notes: None,
            video_call_id: None,
            created_at: Some(start),
            updated_at: Some(start),
        }
    }

    fn expected(role: ActorRole, from: AppointmentStatus) -> Vec<AppointmentStatus> {
        match (role, from) {
            (ActorRole::Doctor, Requested) => vec![Scheduled, Cancelled],
            (ActorRole::Doctor, Scheduled) => vec![InProgress, Cancelled, NoShow],
            (ActorRole::Doctor, InProgress) => vec![Completed, Cancelled],
            (ActorRole::Patient, Requested) => vec![Cancelled],
            (ActorRole::Patient, Scheduled) => vec![Cancelled],
            _ => vec![],
        }
    }

    #[test]
    fn every_state_and_role_pair_follows_the_table() {
        for role in ActorRole::ALL {
            for from in AppointmentStatus::ALL {
                let allowed = expected(role, from);
                assert_eq!(allowed_transitions(role, from), allowed.as_slice(), "{role} from {from}");

                for to in AppointmentStatus::ALL {
                    let original = appointment(from);
                    let result = apply_transition(&original, role, to);

                    if allowed.contains(&to) {
                        let updated = result.unwrap();
                        assert_eq!(updated.status, to);
                        assert_eq!(Appointment { status: from, ..updated }, original);
                    } else {
                        assert_matches!(
                            result,
                            Err(TransitionError::InvalidTransition { from: f, ref requested })
                                if f == from && requested == to.as_str()
                        );
                    }
                    assert_eq!(original.status, from);
                }
            }
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for role in ActorRole::ALL {
            for status in AppointmentStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
                assert!(allowed_transitions(role, status).is_empty());
            }
        }
    }

    #[test]
    fn doctor_confirms_requested_appointment() {
        let original = appointment(Requested);
        let updated = apply_transition(&original, ActorRole::Doctor, Scheduled).unwrap();

        assert_eq!(updated.status, Scheduled);
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.symptoms, original.symptoms);
        assert_eq!(original.status, Requested);
    }

    #[test]
    fn doctor_cannot_complete_before_starting() {
        let result = apply_transition(&appointment(Scheduled), ActorRole::Doctor, Completed);

        assert_matches!(result, Err(TransitionError::InvalidTransition { from: Scheduled, .. }));
    }

    #[test]
    fn patient_cannot_confirm() {
        let result = apply_transition(&appointment(Requested), ActorRole::Patient, Scheduled);

        assert_matches!(result, Err(TransitionError::InvalidTransition { .. }));
    }

    #[test]
    fn patient_cancels_from_strings() {
        let updated = apply_requested_transition(&appointment(Scheduled), "patient", "cancelled").unwrap();

        assert_eq!(updated.status, Cancelled);
    }

    #[test]
    fn unrecognised_status_is_an_invalid_transition() {
        let result = apply_requested_transition(&appointment(Requested), "doctor", "confirmed");

        assert_matches!(
            result,
            Err(TransitionError::InvalidTransition { from: Requested, ref requested }) if requested == "confirmed"
        );
    }

    #[test]
    fn unrecognised_role_is_reported_as_such() {
        let result = apply_requested_transition(&appointment(Requested), "admin", "cancelled");

        assert_matches!(result, Err(TransitionError::UnknownRole(UnknownRole(role))) if role == "admin");
    }

    #[test]
    fn role_is_checked_before_status() {
        let result = apply_requested_transition(&appointment(Requested), "nurse", "bogus");

        assert_matches!(result, Err(TransitionError::UnknownRole(_)));
    }
}
