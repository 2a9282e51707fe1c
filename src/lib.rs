#![deny(unused_must_use)]
#![deny(unsafe_code)]
#![allow(clippy::new_without_default)]

pub mod apis;
mod asset;
mod candle;
mod clock;
mod current_candle;
mod exchange;
pub mod leverage;
mod market;
mod order;
mod order_history;
pub mod pager;
mod settings;
mod timeframe;

pub use apis::ApiError;
pub use asset::*;
pub use candle::*;
pub use clock::*;
pub use current_candle::*;
pub use exchange::*;
pub use market::*;
pub use order::*;
pub use order_history::*;
pub use settings::*;
pub use timeframe::*;

pub type AnyError = Box<dyn std::error::Error + Send + Sync>;
