//! Data models for WatchRewards entities

mod account;
mod claim;
mod video;
mod withdrawal;

pub use account::*;
pub use claim::*;
pub use video::*;
pub use withdrawal::*;
