pub mod timer;

pub use timer::{
    Clock, FiredTimers, ManualClock, ManualScheduler, Scheduler, TimerId, TokioClock,
    TokioScheduler,
};
