pub mod contracts;
pub mod passengers;
