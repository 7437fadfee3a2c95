//! Operator notifications
//!
//! `TelegramNotifier` posts HTML messages to a chat; `LogNotifier` writes the
//! same events to the log when Telegram is not configured.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, info};

use super::traits::Notifier;
use crate::domain::{FigureSource, Notification, ProfitSummary};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn solscan_link(signature: &str) -> String {
    format!(
        "🔗 <b>Transaction:</b> <a href=\"https://solscan.io/tx/{}\">View on Solscan</a>",
        signature
    )
}

fn with_usd(sol: f64, sol_price_usd: Option<f64>) -> String {
    match sol_price_usd {
        Some(price) => format!("{:.5} SOL (${:.2})", sol, sol * price),
        None => format!("{:.5} SOL", sol),
    }
}

fn profit_summary_block(summary: &ProfitSummary, sol_price_usd: Option<f64>) -> String {
    format!(
        "\n\n📈 <b>Profit Summary:</b>\n\
         • <b>Last 24h:</b> {}\n\
         • <b>Last week:</b> {}\n\
         • <b>Projected weekly:</b> {}",
        with_usd(summary.last_24h, sol_price_usd),
        with_usd(summary.last_week, sol_price_usd),
        with_usd(summary.projected_week, sol_price_usd),
    )
}

fn humanize(interval: Duration) -> String {
    let secs = interval.as_secs();
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, 0, s) => format!("{}s", s),
        (0, m, 0) => format!("{}m", m),
        (0, m, s) => format!("{}m{}s", m, s),
        (h, m, _) => format!("{}h{}m", h, m),
    }
}

/// Render an event as Telegram HTML
pub fn render(event: &Notification, now: DateTime<Local>) -> String {
    let time = now.format(TIME_FORMAT);
    match event {
        Notification::Started {
            wallet,
            minimum_usd_threshold,
            check_interval,
            auto_sell,
        } => format!(
            "👋 <b>Welcome to Boop Airdrop Redeemer Bot!</b> 👋\n\n\
             🤖 <b>About this bot:</b>\n\
             This bot monitors the Boop platform for valuable airdrops, \
             claims them when they meet your value threshold, and converts tokens to SOL.\n\n\
             ⚙️ <b>Current Settings:</b>\n\
             🔍 <b>Wallet:</b> {}\n\
             💵 <b>Minimum USD threshold:</b> ${:.2}\n\
             ⏱️ <b>Check interval:</b> {}\n\
             🔄 <b>Auto-sell to SOL:</b> {}\n\n\
             🚀 <b>Bot is now running!</b> You'll receive notifications automatically.",
            wallet,
            minimum_usd_threshold,
            humanize(*check_interval),
            if *auto_sell { "Enabled" } else { "Disabled" },
        ),
        Notification::Claimed {
            token_name,
            token_symbol,
            amount,
            usd_value,
            signature,
        } => format!(
            "🎉 <b>Token Claimed Successfully!</b> 🎉\n\n\
             🪙 <b>Token:</b> {} ({})\n\
             💰 <b>Amount:</b> {:.2}\n\
             💵 <b>USD Value:</b> ${:.2}\n\
             🕒 <b>Time:</b> {}\n\
             {}",
            token_name,
            token_symbol,
            amount,
            usd_value,
            time,
            solscan_link(signature),
        ),
        Notification::Sold {
            token_name,
            token_symbol,
            amount,
            net_profit_sol,
            sol_price_usd,
            summary,
            source,
            signature,
        } => {
            let marker = match source {
                FigureSource::Measured => "",
                FigureSource::Estimated => " (estimated)",
            };
            let mut message = format!(
                "💎 <b>Transaction Complete!</b> 💎\n\n\
                 🪙 <b>Token:</b> {} ({})\n\
                 💰 <b>Amount Sold:</b> {:.2}\n\
                 ✨ <b>Net Profit:</b> {}{}\n\
                 🕒 <b>Time:</b> {}\n\
                 {}",
                token_name,
                token_symbol,
                amount,
                with_usd(*net_profit_sol, *sol_price_usd),
                marker,
                time,
                solscan_link(signature),
            );
            if let Some(summary) = summary {
                message.push_str(&profit_summary_block(summary, *sol_price_usd));
            }
            message
        }
        Notification::SaleFailed {
            token_name,
            token_symbol,
            amount,
            usd_value,
            attempts,
            error,
        } => format!(
            "❌ <b>Token Sale Failed!</b> ❌\n\n\
             🪙 <b>Token:</b> {} ({})\n\
             💰 <b>Amount:</b> {:.2}\n\
             💵 <b>USD Value:</b> ${:.2}\n\
             🔄 <b>Attempts:</b> {}\n\
             ⚠️ <b>Error:</b> {}\n\
             🕒 <b>Time:</b> {}",
            token_name, token_symbol, amount, usd_value, attempts, error, time,
        ),
    }
}

/// Telegram bot sink
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            client: Client::new(),
            api_base: "https://api.telegram.org".to_string(),
            bot_token,
            chat_id,
        }
    }

    /// Send a raw HTML message
    pub async fn send_message(&self, text: &str) -> Result<(), String> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let payload = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        match self.client.post(&url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!("Telegram notification sent");
                Ok(())
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                Err(format!("HTTP {}: {}", status, body))
            }
            Err(e) => Err(e.to_string()),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, event: Notification) {
        let text = render(&event, Local::now());
        if let Err(e) = self.send_message(&text).await {
            error!("Failed to send {} notification: {}", event.kind(), e);
        }
    }
}

/// Log-only sink
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: Notification) {
        match &event {
            Notification::Started { wallet, .. } => {
                info!(event = event.kind(), "Redeemer started for wallet {}", wallet)
            }
            Notification::Claimed {
                token_symbol,
                amount,
                signature,
                ..
            } => info!(event = event.kind(), %signature, "Claimed {:.2} {}", amount, token_symbol),
            Notification::Sold {
                token_symbol,
                net_profit_sol,
                source,
                signature,
                ..
            } => info!(
                event = event.kind(),
                %signature,
                %source,
                "Sold {}, net profit {:.5} SOL",
                token_symbol,
                net_profit_sol
            ),
            Notification::SaleFailed {
                token_symbol,
                attempts,
                error,
                ..
            } => error!(
                event = event.kind(),
                "Sale of {} failed after {} attempts: {}", token_symbol, attempts, error
            ),
        }
    }
}
