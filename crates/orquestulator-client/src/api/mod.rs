//! API endpoint implementations.

mod evaluate;
mod health;
mod session;
mod stackstorm;

pub use evaluate::EvaluateApi;
pub use health::HealthApi;
pub use session::SessionApi;
pub use stackstorm::StackStormApi;
