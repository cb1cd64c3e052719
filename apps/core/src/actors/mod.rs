pub mod agent;
pub mod messages;
pub mod traits;
