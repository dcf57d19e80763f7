pub mod diff;
pub mod sync;
pub mod watch;
