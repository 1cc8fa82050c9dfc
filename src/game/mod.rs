pub mod countdown;
pub mod judge;
pub mod round;
pub mod session;

pub use session::{Session, SessionConfig, SessionControl, SessionInputs, UiUpdate};
