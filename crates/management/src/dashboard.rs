//! Dashboard statistics and the live watcher that keeps them fresh.
//!
//! The watcher holds one change-feed subscription per tier table and
//! recomputes the stats on every event. Dropping the watcher stops its task,
//! which releases all three subscriptions.

use crate::store::LineStore;
use crate::table::CURRENCY;
use chrono::{DateTime, Utc};
use lines_core::{ChangeFeed, LinesResult, PaymentStatus, RenewalStatus, StatsRow, Subscription, Tier};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

/// Aggregates over all three tier tables.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct DashboardStats {
    pub total: usize,
    pub total_20: usize,
    pub total_40: usize,
    pub total_60: usize,
    pub paid_customers: usize,
    pub renewed_customers: usize,
    pub total_revenue: f64,
    pub paid_percentage: u32,
    pub renewal_percentage: u32,
    pub revenue_label: String,
}

impl DashboardStats {
    pub fn compute(lines_20: &[StatsRow], lines_40: &[StatsRow], lines_60: &[StatsRow]) -> Self {
        let all: Vec<&StatsRow> = lines_20.iter().chain(lines_40).chain(lines_60).collect();
        let total = all.len();
        let paid = all.iter().filter(|r| r.payment_status == PaymentStatus::Paid).count();
        let renewed = all.iter().filter(|r| r.renewal_status == RenewalStatus::Done).count();
        let revenue: f64 = all.iter().map(|r| r.monthly_price.unwrap_or(0.0)).sum();

        Self {
            total,
            total_20: lines_20.len(),
            total_40: lines_40.len(),
            total_60: lines_60.len(),
            paid_customers: paid,
            renewed_customers: renewed,
            total_revenue: revenue,
            paid_percentage: percentage(paid, total),
            renewal_percentage: percentage(renewed, total),
            revenue_label: format_revenue(revenue),
        }
    }
}

/// `part / total` as a whole percentage; 0 when `total` is 0.
pub fn percentage(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let pct = (part as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u32
}

/// `1234567.5` -> `"1,234,567.50 EGP"`.
pub fn format_revenue(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let (whole, frac) = (cents / 100, cents % 100);

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if negative { "-" } else { "" };
    if frac == 0 {
        format!("{sign}{grouped} {CURRENCY}")
    } else {
        format!("{sign}{grouped}.{frac:02} {CURRENCY}")
    }
}

/// Where dashboard rows are read from.
pub trait StatsSource: Send + Sync {
    fn select_stats(&self, tier: Tier) -> LinesResult<Vec<StatsRow>>;
}

impl StatsSource for LineStore {
    fn select_stats(&self, tier: Tier) -> LinesResult<Vec<StatsRow>> {
        Ok(LineStore::select_stats(self, tier))
    }
}

/// Read all three tables and aggregate.
pub fn fetch_stats(source: &dyn StatsSource) -> LinesResult<DashboardStats> {
    let lines_20 = source.select_stats(Tier::Lines20)?;
    let lines_40 = source.select_stats(Tier::Lines40)?;
    let lines_60 = source.select_stats(Tier::Lines60)?;
    Ok(DashboardStats::compute(&lines_20, &lines_40, &lines_60))
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardSnapshot {
    pub loading: bool,
    pub stats: DashboardStats,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub refreshes: u64,
}

impl DashboardSnapshot {
    fn loading() -> Self {
        Self {
            loading: true,
            stats: DashboardStats::compute(&[], &[], &[]),
            refreshed_at: None,
            refreshes: 0,
        }
    }

    /// Re-read the stats. A failed read keeps the previous numbers.
    fn refresh(&mut self, source: &dyn StatsSource) {
        match fetch_stats(source) {
            Ok(stats) => {
                self.stats = stats;
                self.refreshed_at = Some(Utc::now());
                self.refreshes += 1;
                metrics::counter!("dashboard.refreshes").increment(1);
            }
            Err(e) => {
                warn!(error = %e, "Dashboard refresh failed, keeping previous stats");
                metrics::counter!("dashboard.refresh_failures").increment(1);
            }
        }
        self.loading = false;
    }
}

/// Live dashboard: a background task fed by the change feed.
pub struct DashboardWatcher {
    task: JoinHandle<()>,
    receiver: watch::Receiver<DashboardSnapshot>,
}

impl DashboardWatcher {
    /// Subscribe to every tier table and start the refresh task.
    pub fn spawn(source: Arc<dyn StatsSource>, feed: &ChangeFeed) -> Self {
        let subscriptions = Tier::ALL.map(|tier| feed.subscribe(Some(tier)));
        let (sender, receiver) = watch::channel(DashboardSnapshot::loading());
        let task = tokio::spawn(run(source, subscriptions, sender));
        info!("Dashboard watcher started");
        Self { task, receiver }
    }

    pub fn current(&self) -> DashboardSnapshot {
        self.receiver.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.receiver.clone()
    }

    /// Snapshots as a stream. The watcher lives as long as the stream.
    pub fn into_stream(self) -> impl Stream<Item = DashboardSnapshot> + Send + 'static {
        let snapshots = WatchStream::new(self.receiver.clone());
        snapshots.map(move |snapshot| {
            let _watcher = &self;
            snapshot
        })
    }
}

impl Drop for DashboardWatcher {
    fn drop(&mut self) {
        self.task.abort();
        debug!("Dashboard watcher stopped");
    }
}

async fn run(
    source: Arc<dyn StatsSource>,
    subscriptions: [Subscription; 3],
    sender: watch::Sender<DashboardSnapshot>,
) {
    let [mut lines_20, mut lines_40, mut lines_60] = subscriptions;
    let mut snapshot = DashboardSnapshot::loading();
    snapshot.refresh(source.as_ref());
    if sender.send(snapshot.clone()).is_err() {
        return;
    }

    loop {
        let event = tokio::select! {
            Some(event) = lines_20.recv() => event,
            Some(event) = lines_40.recv() => event,
            Some(event) = lines_60.recv() => event,
            else => break,
        };
        debug!(table = %event.table, kind = ?event.kind, "Dashboard refresh triggered");
        snapshot.refresh(source.as_ref());
        // Nobody is looking any more.
        if sender.send(snapshot.clone()).is_err() {
            break;
        }
    }
}
