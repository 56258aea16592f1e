pub mod contracts;
pub mod rides;
