pub mod amount_policy;
pub mod catalog;
pub mod entitlement;
pub mod error;
pub mod gateway;
pub mod id;
pub mod money;
pub mod purchase;
pub mod store;
pub mod transaction;
pub mod webhook;

use std::{future::Future, pin::Pin};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
