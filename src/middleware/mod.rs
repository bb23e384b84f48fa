mod rate_limit;
mod user_auth;

pub use rate_limit::*;
pub use user_auth::*;
