//! Data models for Pricewatch

mod alert;
mod price;
mod watchlist;

pub use alert::*;
pub use price::*;
pub use watchlist::*;
