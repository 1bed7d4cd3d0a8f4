pub mod admin_client;
