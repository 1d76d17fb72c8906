pub mod gateway_client;
pub mod webhook_signature;
