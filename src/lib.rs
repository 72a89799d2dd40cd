pub mod board;
pub mod bot;
pub mod client;
pub mod game;
pub mod protocol;
pub mod relay;
pub mod session;

pub use board::*;
pub use bot::*;
pub use game::*;
pub use protocol::*;
