pub mod identity;

pub use identity::{CurrentUser, Role};
