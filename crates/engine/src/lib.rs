pub mod cooldown;
pub mod registration;
pub mod stats;
