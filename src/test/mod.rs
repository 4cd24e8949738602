pub mod utils;

pub use utils::*;

mod api_attendance;
mod provider_writes;
