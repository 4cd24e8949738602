pub mod attendance;
pub mod auth;
pub mod catchers;
pub mod clients;
pub mod public;
pub mod users;
