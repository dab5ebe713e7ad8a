mod async_task;
mod observability;
mod redeploy_timer;
pub mod time;

pub(crate) use async_task::*;
pub use observability::*;
pub(crate) use redeploy_timer::*;

#[cfg(test)]
mod redeploy_timer_test;
