pub mod audit;
pub mod bus;
pub mod error;
pub mod events;
pub mod shutdown;
pub mod status;
pub mod telemetry;
