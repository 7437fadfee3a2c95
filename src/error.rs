use thiserror::Error;

/// Main error type for the redeemer
#[derive(Error, Debug)]
pub enum RedeemerError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error: {0}")]
    Rpc(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Domain errors
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Claim error: {0}")]
    Claim(#[from] ClaimError),

    #[error("Sell error: {0}")]
    Sell(#[from] SellError),

    // Crypto/signing errors
    #[error("Wallet error: {0}")]
    Wallet(String),

    // Authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),

    // Stats persistence errors
    #[error("Stats error: {0}")]
    Stats(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

}

/// Result type alias for RedeemerError
pub type Result<T> = std::result::Result<T, RedeemerError>;

/// Coarse failure class shared by every collaborator error.
///
/// The orchestration loop only branches on the class; the message is kept
/// for logs and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Credentials rejected; a refresh may help
    Auth,
    /// Transport-level failure; retry soon
    Network,
    /// Will never succeed for this airdrop
    Permanent,
    /// Anything else
    Other,
}

const NETWORK_MARKERS: [&str; 3] = ["unexpected eof", "connection refused", "i/o timeout"];
const AUTH_MARKERS: [&str; 5] = [
    "status code: 401",
    "status code: 403",
    "not authorized",
    "unauthorized",
    "graphql authorization error",
];
const PERMANENT_MARKERS: [&str; 4] = [
    "is already claimed",
    "invalid token amount",
    "failed to parse token amount",
    "failed to find merkle distributor",
];

/// Classify a free-form error message.
///
/// Used for errors that reach us as text only (RPC bodies, HTTP bodies).
pub fn classify_message(message: &str) -> ErrorClass {
    let lower = message.to_ascii_lowercase();
    if PERMANENT_MARKERS.iter().any(|m| lower.contains(m)) {
        ErrorClass::Permanent
    } else if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
        ErrorClass::Auth
    } else if NETWORK_MARKERS.iter().any(|m| lower.contains(m)) {
        ErrorClass::Network
    } else {
        ErrorClass::Other
    }
}

/// Errors from the upstream airdrop listing
#[derive(Error, Debug, Clone)]
pub enum FeedError {
    #[error("feed authorization failed: {0}")]
    Auth(String),

    #[error("feed network failure: {0}")]
    Network(String),

    #[error("feed protocol error: {0}")]
    Protocol(String),
}

impl FeedError {
    pub fn class(&self) -> ErrorClass {
        match self {
            FeedError::Auth(_) => ErrorClass::Auth,
            FeedError::Network(_) => ErrorClass::Network,
            FeedError::Protocol(msg) => match classify_message(msg) {
                ErrorClass::Permanent => ErrorClass::Other,
                class => class,
            },
        }
    }
}

/// Errors from claiming a single airdrop
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClaimError {
    #[error("airdrop {0} not found")]
    NotFound(String),

    #[error("airdrop {0} is already claimed")]
    AlreadyClaimed(String),

    #[error("invalid token amount: {0}")]
    InvalidAmount(String),

    #[error("failed to find merkle distributor: {0}")]
    DistributorNotFound(String),

    #[error("claim authorization failed: {0}")]
    Auth(String),

    #[error("claim network failure: {0}")]
    Network(String),

    #[error("claim transaction failed: {0}")]
    Chain(String),
}

impl ClaimError {
    /// Permanent errors mean the airdrop must never be retried
    pub fn is_permanent(&self) -> bool {
        match self {
            ClaimError::AlreadyClaimed(_)
            | ClaimError::InvalidAmount(_)
            | ClaimError::DistributorNotFound(_) => true,
            // Program logs only reach us as text
            ClaimError::Chain(msg) => classify_message(msg) == ErrorClass::Permanent,
            _ => false,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            e if e.is_permanent() => ErrorClass::Permanent,
            ClaimError::Auth(_) => ErrorClass::Auth,
            ClaimError::Network(_) => ErrorClass::Network,
            ClaimError::Chain(msg) => classify_message(msg),
            _ => ErrorClass::Other,
        }
    }
}

/// Errors from a single swap attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwapError {
    #[error("quote failed: {0}")]
    Quote(String),

    /// The venue refused shared accounts for the selected route
    #[error("route rejected shared accounts: {0}")]
    SharedAccountsUnsupported(String),

    #[error("swap build failed: {0}")]
    Build(String),

    #[error("swap submission failed: {0}")]
    Submit(String),

    #[error("swap authorization failed: {0}")]
    Auth(String),

    #[error("swap network failure: {0}")]
    Network(String),
}

impl SwapError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SwapError::Auth(_) => ErrorClass::Auth,
            SwapError::Network(_) => ErrorClass::Network,
            _ => ErrorClass::Other,
        }
    }
}

/// Errors from selling a token
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SellError {
    #[error("invalid token amount: {0}")]
    InvalidAmount(String),

    #[error("all {attempts} attempts failed, last error: {last}")]
    Exhausted { attempts: u32, last: SwapError },
}

impl SellError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SellError::InvalidAmount(_) => ErrorClass::Permanent,
            SellError::Exhausted { last, .. } => last.class(),
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            SellError::InvalidAmount(_) => 0,
            SellError::Exhausted { attempts, .. } => *attempts,
        }
    }
}
