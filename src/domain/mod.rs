pub mod airdrop;
pub mod events;

pub use airdrop::*;
pub use events::*;
