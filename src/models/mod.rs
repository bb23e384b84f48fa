mod audit_log;
mod billing_plan;
mod campaign;
mod email_settings;
mod gateway;
mod homepage;
mod lead;
mod template;
mod transaction;
mod user;

pub use audit_log::*;
pub use billing_plan::*;
pub use campaign::*;
pub use email_settings::*;
pub use gateway::*;
pub use homepage::*;
pub use lead::*;
pub use template::*;
pub use transaction::*;
pub use user::*;

use serde::{Deserialize, Deserializer};

/// Deserialize a present field (even `null`) as `Some(..)`, so that
/// `Option<Option<T>>` with `#[serde(default)]` tells "absent" from "null".
pub(crate) fn double_option<'de, T, D>(de: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}
