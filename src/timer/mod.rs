pub mod commands;
pub mod controller;
pub mod pause;
pub mod scheduler;
pub mod state;

pub use commands::TimerCommand;
pub use controller::{TimerController, TimerEvent, TimerSnapshot};
pub use pause::{PauseAccountant, PauseState};
pub use scheduler::{PeriodicScheduler, Tick, TickKind, TickSource, TokioScheduler};
pub use state::{ClockState, ClockStatus, ManualEdit, SessionClock, TickOutcome};
