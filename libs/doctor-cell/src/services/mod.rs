pub mod availability;
pub mod doctor;
pub mod slots;

pub use availability::AvailabilityService;
pub use doctor::DoctorService;
pub use slots::{compute_open_slots, validate_booking_request, OpenSlots, DEFAULT_WINDOW_DAYS};
