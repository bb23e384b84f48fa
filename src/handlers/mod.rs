pub mod admin;
pub mod billing;
pub mod campaigns;
pub mod public;
pub mod users;
pub mod webhooks;
