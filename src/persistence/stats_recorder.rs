//! Monthly CSV ledger of claim and swap transactions
//!
//! One file per month (`transactions_YYYY-MM.csv`). Amounts are written in
//! SOL with nine decimals. The trailing `Source` column marks rows whose
//! figures were estimated rather than read back from the chain.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::adapters::StatsSink;
use crate::domain::{
    signed_lamports_to_sol, lamports_to_sol, FigureSource, ProfitSummary, TransactionStats,
    TxKind, LAMPORTS_PER_SOL,
};
use crate::error::{RedeemerError, Result};

const HEADER: [&str; 9] = [
    "Timestamp",
    "Type",
    "Token",
    "Amount",
    "Expenses (SOL)",
    "Gross Profit (SOL)",
    "Net Profit (SOL)",
    "Transaction Hash",
    "Source",
];

/// CSV-backed stats sink
pub struct CsvStatsRecorder {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvStatsRecorder {
    /// Create the recorder, creating `data_dir` if needed
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir).map_err(|e| {
            RedeemerError::Stats(format!(
                "failed to create data directory {}: {e}",
                data_dir.display()
            ))
        })?;
        Ok(Self {
            data_dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn file_for(&self, timestamp: DateTime<Utc>) -> PathBuf {
        self.data_dir
            .join(format!("transactions_{}.csv", timestamp.format("%Y-%m")))
    }

    fn append(&self, stats: &TransactionStats) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let path = self.file_for(stats.timestamp);
        let is_new = !path.exists();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        if is_new {
            writeln!(file, "{}", HEADER.join(","))?;
        }
        writeln!(file, "{}", format_row(stats))?;
        debug!(file = %path.display(), tx = %stats.signature, "recorded {} stats", stats.kind.as_str());
        Ok(())
    }

    /// Every parseable row across all monthly files
    pub fn read_all(&self) -> Result<Vec<TransactionStats>> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut rows = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            let is_ledger = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("transactions_") && n.ends_with(".csv"))
                .unwrap_or(false);
            if !is_ledger {
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(content) => rows.extend(content.lines().skip(1).filter_map(parse_row)),
                Err(e) => warn!(file = %path.display(), "skipping unreadable stats file: {}", e),
            }
        }
        Ok(rows)
    }

    /// Swap profit over the last 24 hours and 7 days relative to `now`
    pub fn profit_summary_at(&self, now: DateTime<Utc>) -> Result<ProfitSummary> {
        Ok(summarize(&self.read_all()?, now))
    }
}

impl StatsSink for CsvStatsRecorder {
    fn record(&self, stats: &TransactionStats) -> Result<()> {
        self.append(stats)
    }

    fn profit_summary(&self) -> Result<ProfitSummary> {
        self.profit_summary_at(Utc::now())
    }
}

/// Projection: a day of activity extrapolates to a week, otherwise the
/// week's actual total stands.
pub fn summarize(rows: &[TransactionStats], now: DateTime<Utc>) -> ProfitSummary {
    let day_ago = now - Duration::hours(24);
    let week_ago = now - Duration::days(7);

    let mut summary = ProfitSummary::default();
    let mut recent = 0usize;

    for row in rows.iter().filter(|r| r.kind == TxKind::Swap) {
        let net = signed_lamports_to_sol(row.net_lamports);
        if row.timestamp > day_ago {
            summary.last_24h += net;
            recent += 1;
        }
        if row.timestamp > week_ago {
            summary.last_week += net;
        }
    }

    summary.projected_week = if recent > 0 {
        summary.last_24h * 7.0
    } else {
        summary.last_week
    };
    summary
}

fn format_row(stats: &TransactionStats) -> String {
    [
        stats.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        stats.kind.as_str().to_string(),
        csv_field(&stats.token_symbol),
        csv_field(&stats.token_amount),
        format!("{:.9}", lamports_to_sol(stats.expenses_lamports)),
        format!("{:.9}", lamports_to_sol(stats.gross_lamports)),
        format!("{:.9}", signed_lamports_to_sol(stats.net_lamports)),
        csv_field(&stats.signature),
        stats.source.as_str().to_string(),
    ]
    .join(",")
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            ('"', _) => quoted = !quoted,
            (',', false) => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn sol_to_lamports(value: &str) -> Option<i64> {
    let sol = value.trim().parse::<f64>().ok()?;
    Some((sol * LAMPORTS_PER_SOL as f64).round() as i64)
}

fn parse_row(line: &str) -> Option<TransactionStats> {
    let fields = split_csv_line(line);
    if fields.len() < 8 {
        return None;
    }

    let timestamp = DateTime::parse_from_rfc3339(fields[0].trim())
        .ok()?
        .with_timezone(&Utc);
    let source = match fields.get(8).map(|s| s.trim()) {
        Some("estimated") => FigureSource::Estimated,
        _ => FigureSource::Measured,
    };

    Some(TransactionStats {
        timestamp,
        kind: TxKind::parse(fields[1].trim())?,
        token_symbol: fields[2].clone(),
        token_amount: fields[3].clone(),
        expenses_lamports: sol_to_lamports(&fields[4]).unwrap_or(0).max(0) as u64,
        gross_lamports: sol_to_lamports(&fields[5]).unwrap_or(0).max(0) as u64,
        net_lamports: sol_to_lamports(&fields[6]).unwrap_or(0),
        signature: fields[7].clone(),
        source,
    })
}
