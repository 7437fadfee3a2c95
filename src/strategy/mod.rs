//! Strategy module
//!
//! Claim/sell policy and the components that act on it:
//! - `price_tracker` - per-airdrop price history
//! - `decision` - claim and direct-sell eligibility
//! - `claimed_set` - local dedup state
//! - `claimer` / `seller` - claim and swap execution

pub mod claimed_set;
pub mod claimer;
pub mod decision;
pub mod price_tracker;
pub mod seller;

pub use claimed_set::{ClaimedSet, InFlight};
pub use claimer::{ClaimReceipt, Claimer, ClaimerConfig, SaleStatus};
pub use decision::{ClaimDecision, DecisionMaker, DecisionPolicy};
pub use price_tracker::PriceTracker;
pub use seller::{SellerConfig, TokenSeller, WSOL_MINT};
