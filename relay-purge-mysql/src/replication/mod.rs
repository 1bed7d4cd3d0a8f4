pub mod client;
pub mod grants;
pub mod health;
