pub mod board;
pub mod card;
pub mod list;
pub mod user;

pub use board::Board;
pub use card::Card;
pub use list::List;
pub use user::{SanitizedUser, User};
