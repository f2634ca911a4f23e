#![deny(rust_2018_idioms)]

mod clock;
pub mod commands;
mod config;
mod services;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CoreConfig;
pub use services::{ServiceCollection, ServiceCollectionBuilder};
