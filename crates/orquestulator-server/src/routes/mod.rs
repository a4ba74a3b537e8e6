//! API routes.

pub mod evaluate;
pub mod health;
pub mod openapi;
pub mod session;
pub mod stackstorm;

pub use evaluate::{EvaluateRequest, EvaluateResponse, evaluate_handler};
pub use health::health_routes;
pub use openapi::openapi_handler;
pub use session::{
    AuthRequest, AuthResponse, AuthStatusResponse, SessionCountResponse, SessionDataRequest,
    SessionDataResponse, authenticate_handler, count_handler, get_data_handler, status_handler,
    store_data_handler,
};
pub use stackstorm::{
    ConnectionRequest, ConnectionStatusResponse, ConnectionsResponse, ExecutionResponse,
    ExecutionsResponse, get_connection_handler, get_execution_handler, list_executions_handler,
    set_connection_handler, test_connection_handler,
};
