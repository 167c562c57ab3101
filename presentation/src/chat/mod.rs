//! Interactive chat module
//!
//! Line-by-line session over stdin: every line is one message to the council.

mod session;

pub use session::ChatSession;
