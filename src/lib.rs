pub mod cache;
pub mod config;
pub mod constants;
pub mod core;
pub mod events;
pub mod index;
pub mod loaders;
pub mod lock;
pub mod monitor;
pub mod usd_price;
pub mod workers;
