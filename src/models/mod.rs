mod board;
mod post;
mod thread;

pub use board::*;
pub use post::*;
pub use thread::*;
