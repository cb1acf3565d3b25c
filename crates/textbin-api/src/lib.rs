pub mod comments;
pub mod error;
pub mod extract;
pub mod health;
pub mod likes;
pub mod middleware;
pub mod routes;
pub mod service;
pub mod state;
pub mod texts;
