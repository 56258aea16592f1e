pub mod ride;
pub mod transition;
