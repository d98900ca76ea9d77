//! Record table view model, generic over tier.
//!
//! Reads the tier's read source once on mount, renders one row per record
//! with formatted dates, status badges and a renewal-urgency badge, and
//! handles the delete and edit row actions.

use crate::store::LineStore;
use chrono::NaiveDate;
use lines_core::{Failure, LineRecord, Notification, PaymentStatus, RenewalStatus, Tier, RENEWAL_DUE_WINDOW_DAYS};
use serde::Serialize;
use tracing::{info, warn};

pub const NOT_SET: &str = "not set";
pub const CURRENCY: &str = "EGP";

/// Urgency of a line's renewal, derived from the storage-computed fields.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RenewalUrgency {
    None,
    DueSoon { days: i64 },
    Overdue,
}

impl RenewalUrgency {
    pub fn from_record(record: &LineRecord) -> Self {
        Self::from_fields(record.is_renewal_due, record.days_until_renewal)
    }

    pub fn from_fields(is_renewal_due: Option<bool>, days_until_renewal: Option<i64>) -> Self {
        match (is_renewal_due, days_until_renewal) {
            (Some(true), Some(days)) if days <= 0 => RenewalUrgency::Overdue,
            (Some(true), Some(days)) if days <= RENEWAL_DUE_WINDOW_DAYS => RenewalUrgency::DueSoon { days },
            _ => RenewalUrgency::None,
        }
    }

    pub fn label(&self) -> Option<String> {
        match self {
            RenewalUrgency::None => None,
            RenewalUrgency::DueSoon { days } => Some(format!("Renewal due in {days} days")),
            RenewalUrgency::Overdue => Some("Renewal overdue".to_string()),
        }
    }
}

/// A two-state badge.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusBadge {
    pub label: String,
    pub positive: bool,
}

impl From<PaymentStatus> for StatusBadge {
    fn from(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Paid => Self { label: "Paid".into(), positive: true },
            PaymentStatus::Unpaid => Self { label: "Unpaid".into(), positive: false },
        }
    }
}

impl From<RenewalStatus> for StatusBadge {
    fn from(status: RenewalStatus) -> Self {
        match status {
            RenewalStatus::Done => Self { label: "Renewed".into(), positive: true },
            RenewalStatus::NotDone => Self { label: "Not renewed".into(), positive: false },
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TableRow {
    pub id: i64,
    pub customer_name: String,
    pub mobile_number: String,
    pub tier_badge: String,
    pub charging_date: String,
    /// Absent for tiers without a renewal date column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renewal_date: Option<String>,
    pub monthly_price: String,
    pub payment: StatusBadge,
    pub renewal: StatusBadge,
    pub urgency: RenewalUrgency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency_label: Option<String>,
}

impl TableRow {
    pub fn render(tier: Tier, record: &LineRecord) -> Self {
        let urgency = RenewalUrgency::from_record(record);
        Self {
            id: record.id,
            customer_name: record
                .customer_name
                .as_deref()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or(NOT_SET)
                .to_string(),
            mobile_number: record.mobile_number.clone(),
            tier_badge: format!("{} Mbps", record.line_type),
            charging_date: format_date(record.charging_date),
            renewal_date: tier.config().tracks_renewal.then(|| format_date(record.renewal_date)),
            monthly_price: format_price(record.monthly_price),
            payment: record.payment_status.into(),
            renewal: record.renewal_status.into(),
            urgency,
            urgency_label: urgency.label(),
        }
    }
}

/// Call to action shown in place of an empty table.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EmptyState {
    pub message: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TableView {
    pub tier: Tier,
    pub title: String,
    pub loading: bool,
    pub rows: Vec<TableRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_state: Option<EmptyState>,
}

pub fn format_date(date: Option<NaiveDate>) -> String {
    match date {
        Some(d) => d.format("%d/%m/%Y").to_string(),
        None => NOT_SET.to_string(),
    }
}

pub fn format_price(price: Option<f64>) -> String {
    match price {
        Some(p) if p != 0.0 => format!("{} {CURRENCY}", trim_number(p)),
        _ => NOT_SET.to_string(),
    }
}

fn trim_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

/// Table state for one tier.
pub struct RecordTable {
    tier: Tier,
    lines: Vec<LineRecord>,
    loading: bool,
}

impl RecordTable {
    pub fn new(tier: Tier) -> Self {
        Self {
            tier,
            lines: Vec::new(),
            loading: true,
        }
    }

    /// Construct and issue the initial read.
    pub fn mount(tier: Tier, store: &LineStore) -> Self {
        let mut table = Self::new(tier);
        table.load(store);
        table
    }

    pub fn load(&mut self, store: &LineStore) {
        self.lines = store.select(self.tier);
        self.loading = false;
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn lines(&self) -> &[LineRecord] {
        &self.lines
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Delete by id. Local state changes only when storage accepted it.
    pub fn delete(&mut self, store: &LineStore, id: i64, actor: &str) -> Result<Notification, Failure> {
        match store.delete(self.tier, id, actor) {
            Ok(()) => {
                self.lines.retain(|l| l.id != id);
                info!(table = %self.tier, id, "Row removed");
                Ok(Notification::success("Deleted", "The line was deleted successfully"))
            }
            Err(e) => {
                warn!(table = %self.tier, id, error = %e, "Delete failed");
                Err(Failure::new(e, Notification::error("Error", "Failed to delete the line")))
            }
        }
    }

    /// Hand the full record to `on_edit`. Returns false for unknown ids.
    pub fn edit(&self, id: i64, on_edit: impl FnOnce(LineRecord)) -> bool {
        match self.lines.iter().find(|l| l.id == id) {
            Some(record) => {
                on_edit(record.clone());
                true
            }
            None => false,
        }
    }

    pub fn render(&self) -> TableView {
        let config = self.tier.config();
        let empty_state = (!self.loading && self.lines.is_empty()).then(|| EmptyState {
            message: format!("No {} yet", config.label),
            action: "Add the first line".to_string(),
        });
        TableView {
            tier: self.tier,
            title: config.label.to_string(),
            loading: self.loading,
            rows: self.lines.iter().map(|l| TableRow::render(self.tier, l)).collect(),
            empty_state,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lines_core::event_bus::NoOpSink;
    use lines_core::LineDraft;
    use std::cell::RefCell;
    use std::sync::Arc;

    fn store() -> LineStore {
        LineStore::new(Arc::new(NoOpSink)).with_clock(|| NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())
    }

    fn add(store: &LineStore, tier: Tier, mobile: &str) -> LineRecord {
        let draft = LineDraft {
            mobile_number: mobile.into(),
            line_type: tier.line_type().into(),
            ..Default::default()
        };
        store.insert(tier, draft, "admin").unwrap()
    }

    #[test]
    fn test_urgency_badges() {
        assert_eq!(RenewalUrgency::from_fields(Some(true), Some(0)), RenewalUrgency::Overdue);
        assert_eq!(RenewalUrgency::from_fields(Some(true), Some(-4)), RenewalUrgency::Overdue);
        assert_eq!(RenewalUrgency::from_fields(Some(true), Some(3)), RenewalUrgency::DueSoon { days: 3 });
        assert_eq!(RenewalUrgency::from_fields(Some(true), Some(1)), RenewalUrgency::DueSoon { days: 1 });
        assert_eq!(RenewalUrgency::from_fields(Some(false), Some(10)), RenewalUrgency::None);
        // A stale due flag outside the window does not raise a badge.
        assert_eq!(RenewalUrgency::from_fields(Some(true), Some(4)), RenewalUrgency::None);
        assert_eq!(RenewalUrgency::from_fields(Some(true), Some(10)), RenewalUrgency::None);
        assert_eq!(RenewalUrgency::from_fields(Some(true), None), RenewalUrgency::None);
        assert_eq!(RenewalUrgency::from_fields(None, None), RenewalUrgency::None);
        assert!(RenewalUrgency::None.label().is_none());
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_date(NaiveDate::from_ymd_opt(2025, 3, 7)), "07/03/2025");
        assert_eq!(format_date(None), NOT_SET);
        assert_eq!(format_price(Some(120.0)), "120 EGP");
        assert_eq!(format_price(Some(99.5)), "99.50 EGP");
        assert_eq!(format_price(Some(0.0)), NOT_SET);
        assert_eq!(format_price(None), NOT_SET);
    }

    #[test]
    fn test_render_rows_and_empty_state() {
        let store = store();
        let table = RecordTable::mount(Tier::Lines40, &store);
        let view = table.render();
        assert!(!view.loading);
        assert!(view.empty_state.is_some());

        let mut draft = LineDraft {
            mobile_number: "0100".into(),
            line_type: "20".into(),
            renewal_date: NaiveDate::from_ymd_opt(2025, 6, 3),
            ..Default::default()
        };
        draft.customer_name = Some("  ".into());
        store.insert(Tier::Lines20, draft, "admin").unwrap();
        let view = RecordTable::mount(Tier::Lines20, &store).render();
        let row = &view.rows[0];
        assert_eq!(row.customer_name, NOT_SET);
        assert_eq!(row.tier_badge, "20 Mbps");
        assert_eq!(row.renewal_date.as_deref(), Some("03/06/2025"));
        assert_eq!(row.urgency, RenewalUrgency::DueSoon { days: 2 });
        assert!(!row.payment.positive);
        assert!(view.empty_state.is_none());
    }

    #[test]
    fn test_unmounted_table_is_loading() {
        let table = RecordTable::new(Tier::Lines60);
        let view = table.render();
        assert!(view.loading);
        assert!(view.empty_state.is_none());
    }

    #[test]
    fn test_delete_removes_only_that_row() {
        let store = store();
        add(&store, Tier::Lines20, "a");
        add(&store, Tier::Lines20, "b");
        add(&store, Tier::Lines60, "c");
        let mut t20 = RecordTable::mount(Tier::Lines20, &store);
        let t60 = RecordTable::mount(Tier::Lines60, &store);

        let note = t20.delete(&store, 1, "admin").unwrap();
        assert!(!note.is_error());
        let ids: Vec<i64> = t20.lines().iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![2]);
        assert_eq!(t60.lines().len(), 1);
        assert_eq!(store.count(Tier::Lines60), 1);
    }

    #[test]
    fn test_failed_delete_leaves_state() {
        let store = store();
        add(&store, Tier::Lines20, "a");
        let mut table = RecordTable::mount(Tier::Lines20, &store);
        // Removed behind the table's back.
        store.delete(Tier::Lines20, 1, "other").unwrap();

        let failure = table.delete(&store, 1, "admin").unwrap_err();
        assert!(failure.notification.is_error());
        assert_eq!(table.lines().len(), 1);
    }

    #[test]
    fn test_edit_hands_record_to_callback() {
        let store = store();
        add(&store, Tier::Lines60, "0111");
        let table = RecordTable::mount(Tier::Lines60, &store);
        let seen = RefCell::new(None);
        assert!(table.edit(1, |r| *seen.borrow_mut() = Some(r)));
        assert_eq!(seen.borrow().as_ref().unwrap().mobile_number, "0111");
        assert!(!table.edit(42, |_| panic!("no such row")));
        assert_eq!(table.lines().len(), 1);
    }
}
