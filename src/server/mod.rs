pub mod handlers;
pub mod routes;

pub use handlers::SandboxState;
pub use routes::create_router;
