pub mod auth;
pub mod session;

pub use auth::{Authenticated, PublicClient, ServerClient};
pub use session::session_cookies_middleware;
