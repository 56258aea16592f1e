pub mod passengers;
