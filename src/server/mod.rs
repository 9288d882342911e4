mod app;
mod middleware;
mod state;

pub use app::create_app;
pub use middleware::{extract_bearer_token, AuthenticatedUser};
pub use state::AppState;
