pub mod audioproxy;
pub mod config;
pub mod ellipsis;
pub mod emotext;
pub mod error;
pub mod forward;
pub mod handlers;
pub mod models;
pub mod musicstore;
pub mod pipeline;
pub mod routes;
pub mod state;

pub use routes::build_router;
