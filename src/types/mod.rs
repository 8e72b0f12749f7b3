pub mod hourly_frame;
pub mod inventory;
pub mod station;
