pub mod cache;
pub mod circuit_breaker;
pub mod contracts;
pub mod ratings;
pub mod ride_gate;
