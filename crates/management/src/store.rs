//! In-memory line store backed by DashMap, one table per tier.
//!
//! Stands in for the hosted relational store: ids are assigned here,
//! timestamps are set here, renewal fields are derived on read, and every
//! successful mutation is published to the change feed.
//! Production: replace with PostgreSQL (sqlx) or similar ACID store.

use crate::models::{AuditAction, AuditLogEntry};
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use lines_core::event_bus::{ChangeEvent, ChangeKind, EventSink};
use lines_core::types::renewal_fields;
use lines_core::{LineDraft, LinePatch, LineRecord, LinesError, LinesResult, StatsRow, Tier};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Thread-safe store for the three line tables and the audit log.
pub struct LineStore {
    tables: [DashMap<i64, LineRecord>; 3],
    sequences: [AtomicI64; 3],
    sink: Arc<dyn EventSink>,
    audit_log: DashMap<Uuid, AuditLogEntry>,
    today: Clock,
}

impl LineStore {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        info!("Line store initialized (in-memory, development mode)");
        Self {
            tables: [DashMap::new(), DashMap::new(), DashMap::new()],
            sequences: [AtomicI64::new(0), AtomicI64::new(0), AtomicI64::new(0)],
            sink,
            audit_log: DashMap::new(),
            today: Arc::new(|| Utc::now().date_naive()),
        }
    }

    /// Fix the date renewal fields are computed against.
    pub fn with_clock(mut self, today: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.today = Arc::new(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        (self.today)()
    }

    fn table(&self, tier: Tier) -> &DashMap<i64, LineRecord> {
        &self.tables[tier.index()]
    }

    // ─── Reads ─────────────────────────────────────────────────────────────

    /// Full read of a tier's read source, ordered by `id` ascending.
    pub fn select(&self, tier: Tier) -> Vec<LineRecord> {
        let today = self.today();
        let mut lines: Vec<LineRecord> = self
            .table(tier)
            .iter()
            .map(|r| self.project(tier, r.value().clone(), today))
            .collect();
        lines.sort_by_key(|l| l.id);
        debug!(source = tier.config().read_source, rows = lines.len(), "Select");
        lines
    }

    /// `payment_status, renewal_status, monthly_price` for every row of a tier.
    pub fn select_stats(&self, tier: Tier) -> Vec<StatsRow> {
        self.table(tier).iter().map(|r| StatsRow::from(r.value())).collect()
    }

    pub fn get(&self, tier: Tier, id: i64) -> Option<LineRecord> {
        let today = self.today();
        self.table(tier).get(&id).map(|r| self.project(tier, r.value().clone(), today))
    }

    pub fn count(&self, tier: Tier) -> usize {
        self.table(tier).len()
    }

    fn project(&self, tier: Tier, mut record: LineRecord, today: NaiveDate) -> LineRecord {
        if tier.config().tracks_renewal {
            let (days, due) = renewal_fields(record.renewal_date, today);
            record.days_until_renewal = days;
            record.is_renewal_due = due;
        }
        record
    }

    // ─── Writes ────────────────────────────────────────────────────────────

    pub fn insert(&self, tier: Tier, draft: LineDraft, user: &str) -> LinesResult<LineRecord> {
        check_columns(tier, draft.renewal_date.is_some(), draft.monthly_price)?;

        let now = Utc::now();
        let id = self.sequences[tier.index()].fetch_add(1, Ordering::SeqCst) + 1;
        let record = LineRecord {
            id,
            customer_name: draft.customer_name,
            mobile_number: draft.mobile_number,
            line_type: draft.line_type,
            charging_date: draft.charging_date,
            payment_status: draft.payment_status,
            monthly_price: draft.monthly_price,
            renewal_status: draft.renewal_status,
            renewal_date: draft.renewal_date,
            days_until_renewal: None,
            is_renewal_due: None,
            created_at: now,
            updated_at: now,
        };
        self.table(tier).insert(id, record.clone());
        self.log_audit(user, AuditAction::Create, tier.table(), &id.to_string(), serde_json::json!({
            "mobile_number": &record.mobile_number,
        }));
        self.sink.emit(ChangeEvent::new(tier, ChangeKind::Insert, id));
        info!(table = %tier, id, "Line inserted");
        Ok(self.project(tier, record, self.today()))
    }

    /// Apply a partial update. Last write wins.
    pub fn update(&self, tier: Tier, id: i64, patch: LinePatch, user: &str) -> LinesResult<LineRecord> {
        let price = patch.monthly_price.flatten();
        check_columns(tier, patch.sets_renewal_date(), price)?;

        let record = {
            let mut entry = self
                .table(tier)
                .get_mut(&id)
                .ok_or_else(|| LinesError::not_found("line", id))?;
            let r = entry.value_mut();
            if let Some(v) = patch.customer_name { r.customer_name = v; }
            if let Some(v) = patch.mobile_number { r.mobile_number = v; }
            if let Some(v) = patch.line_type { r.line_type = v; }
            if let Some(v) = patch.charging_date { r.charging_date = v; }
            if let Some(v) = patch.payment_status { r.payment_status = v; }
            if let Some(v) = patch.monthly_price { r.monthly_price = v; }
            if let Some(v) = patch.renewal_status { r.renewal_status = v; }
            if let Some(v) = patch.renewal_date { r.renewal_date = v; }
            r.updated_at = Utc::now();
            r.clone()
        };
        self.log_audit(user, AuditAction::Update, tier.table(), &id.to_string(), serde_json::json!({}));
        self.sink.emit(ChangeEvent::new(tier, ChangeKind::Update, id));
        info!(table = %tier, id, "Line updated");
        Ok(self.project(tier, record, self.today()))
    }

    pub fn delete(&self, tier: Tier, id: i64, user: &str) -> LinesResult<()> {
        if self.table(tier).remove(&id).is_none() {
            return Err(LinesError::not_found("line", id));
        }
        self.log_audit(user, AuditAction::Delete, tier.table(), &id.to_string(), serde_json::json!({}));
        self.sink.emit(ChangeEvent::new(tier, ChangeKind::Delete, id));
        info!(table = %tier, id, "Line deleted");
        Ok(())
    }

    // ─── Audit Log ─────────────────────────────────────────────────────────

    pub fn get_audit_log(&self) -> Vec<AuditLogEntry> {
        let mut entries: Vec<AuditLogEntry> = self.audit_log.iter().map(|r| r.value().clone()).collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    pub fn log_audit(&self, user: &str, action: AuditAction, resource_type: &str, resource_id: &str, details: serde_json::Value) {
        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            user: user.to_string(),
            action,
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            details,
            timestamp: Utc::now(),
        };
        self.audit_log.insert(entry.id, entry);
    }
}

/// Column-level constraints the table schema enforces.
fn check_columns(tier: Tier, sets_renewal_date: bool, monthly_price: Option<f64>) -> LinesResult<()> {
    if sets_renewal_date && !tier.config().tracks_renewal {
        return Err(LinesError::Storage(format!(
            "column \"renewal_date\" of relation \"{}\" does not exist",
            tier.table()
        )));
    }
    if let Some(price) = monthly_price {
        if !price.is_finite() || price < 0.0 {
            return Err(LinesError::Storage(format!(
                "new row for relation \"{}\" violates check constraint \"monthly_price_non_negative\"",
                tier.table()
            )));
        }
    }
    Ok(())
}
