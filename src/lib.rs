pub mod batch;
pub mod config;
pub mod db;
pub mod error;
pub mod pdf;
pub mod positioning;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;

pub use routes::router;
