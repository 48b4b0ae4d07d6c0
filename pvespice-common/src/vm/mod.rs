pub mod readiness;

pub use readiness::{
    ensure_running, Readiness, Sleeper, TokioSleeper, START_WAIT_TICK, START_WAIT_TICKS, STOPPED,
};
