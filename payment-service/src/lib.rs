pub mod app;
pub mod config;
pub mod consumer;
pub mod dto;
pub mod engine;
pub mod error;
pub mod events;
pub mod gateway;
pub mod internal_auth;
pub mod metrics;
pub mod model;
pub mod payment_handlers;
pub mod repo;
pub mod resilience;

pub use app::{build_router, AppState};
pub use engine::PaymentEngine;
pub use error::PaymentError;
pub use model::{Payment, PaymentStatus};
