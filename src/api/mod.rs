pub mod handlers;
pub mod routes;

pub use handlers::LIVENESS_MESSAGE;
pub use routes::create_api_router;
