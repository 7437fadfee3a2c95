pub mod boop;
pub mod claim_program;
pub mod jupiter;
pub mod session;
pub mod sol_price;
pub mod solana_rpc;
pub mod telegram;
pub mod traits;
pub mod wallet;

pub use boop::BoopClient;
pub use claim_program::{ClaimProgram, SolanaClaimSubmitter};
pub use jupiter::{JupiterClient, JupiterConfig};
pub use session::{PrivyCredentials, SessionConfig, SessionManager};
pub use sol_price::SolPriceService;
pub use solana_rpc::{extract_fee_and_earnings, SolanaRpc};
pub use telegram::{LogNotifier, TelegramNotifier};
pub use traits::{
    AirdropFeed, BasePriceSource, ClaimRequest, ClaimSubmitter, CredentialRefresher, FeeLookup,
    Notifier, StatsSink, SwapQuote, SwapVenue,
};
pub use wallet::load_keypair;
