pub mod auth;
pub mod boards;
pub mod error;
pub mod metrics;
pub mod ordering;
pub mod session;
pub mod store;

pub use auth::AuthService;
pub use boards::BoardService;
pub use error::ServiceError;
pub use metrics::{get_metrics, init_metrics};
pub use session::{JwtSessionGate, SessionClaims, SessionGate};
pub use store::{EntityStore, MemoryStore, MongoStore};
