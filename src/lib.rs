pub mod button;
pub mod config;
pub mod controller;
pub mod display;
pub mod error;
pub mod events;
pub mod imagery;
pub mod scan;
pub mod scheduler;
