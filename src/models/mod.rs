mod session;

pub use session::{CompletedSessionRecord, SessionType};
