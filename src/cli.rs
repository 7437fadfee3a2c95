use clap::{Parser, Subcommand};

use crate::domain::{Airdrop, ProfitSummary};
use crate::strategy::{ClaimReceipt, SaleStatus};

#[derive(Parser)]
#[command(name = "airdrop-redeemer")]
#[command(version)]
#[command(about = "Claims Boop staking airdrops and sells them for SOL", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config directory (default.toml plus an optional $REDEEMER_ENV file)
    #[arg(short, long, default_value = "config", env = "REDEEMER_CONFIG_DIR")]
    pub config: String,

    /// Override the minimum USD value worth claiming
    #[arg(long, global = true)]
    pub min_usd: Option<f64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the claim and sell loop
    Run {
        /// Claim without selling
        #[arg(long)]
        no_sell: bool,
    },
    /// List pending airdrops once
    Scan,
    /// Claim a single airdrop by id
    Claim {
        /// Airdrop id as listed by `scan`
        id: String,
        /// Claim without selling
        #[arg(long)]
        no_sell: bool,
    },
    /// Show swap profit from the stats ledger
    Stats,
    /// Log newly appearing airdrops without claiming
    Watch,
}

/// Print airdrops as a table
pub fn print_airdrops(airdrops: &[Airdrop]) {
    if airdrops.is_empty() {
        println!("No pending airdrops.");
        return;
    }

    println!(
        "{:<38} {:<10} {:>16} {:>10}  {}",
        "ID", "SYMBOL", "AMOUNT", "USD", "STATUS"
    );
    for airdrop in airdrops {
        let status = if airdrop.is_platform_claimed() {
            "claimed"
        } else {
            "pending"
        };
        println!(
            "{:<38} {:<10} {:>16.2} {:>10}  {}",
            airdrop.id,
            airdrop.token.symbol,
            airdrop.display_amount(),
            airdrop.amount_usd,
            status
        );
    }
    println!("\n{} airdrop(s)", airdrops.len());
}

pub fn print_receipt(receipt: &ClaimReceipt) {
    println!("\x1b[32m✓ Claimed {}\x1b[0m", receipt.airdrop_id);
    println!("  Transaction: https://solscan.io/tx/{}", receipt.signature);
    if let Some(fee) = receipt.fee_lamports {
        println!("  Fee: {} lamports", fee);
    }
    match &receipt.sale {
        SaleStatus::Disabled => println!("  Sale: skipped"),
        SaleStatus::Sold(report) => println!(
            "  Sale: {} ({} lamports, {}, attempt {})",
            report.signature, report.proceeds_lamports, report.source, report.attempts
        ),
        SaleStatus::Failed(err) => println!("\x1b[31m  Sale failed: {}\x1b[0m", err),
    }
}

pub fn print_profit_summary(summary: &ProfitSummary) {
    println!("Swap profit (SOL)");
    println!("  Last 24h:         {:>12.5}", summary.last_24h);
    println!("  Last week:        {:>12.5}", summary.last_week);
    println!("  Projected weekly: {:>12.5}", summary.projected_week);
}
