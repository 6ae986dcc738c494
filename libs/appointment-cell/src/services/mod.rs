pub mod booking;
pub mod lifecycle;

pub use booking::AppointmentBookingService;
pub use lifecycle::{allowed_transitions, apply_requested_transition, apply_transition};
