pub mod booking;
pub mod selection;
pub mod slot;
