pub mod address;
pub mod api;
pub mod models;
pub mod time;

pub use address::{AddressError, normalize_address};
