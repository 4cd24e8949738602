//! Business rules. Every operation returns `Result<T, AppError>`; handlers only
//! translate the result into a response.

pub mod attendance;
pub mod auth;
pub mod clients;
pub mod public;
pub mod users;
