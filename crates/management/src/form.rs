//! Record form view model, generic over tier.

use crate::store::LineStore;
use lines_core::{Failure, LineDraft, LinePatch, LineRecord, LinesError, Notification, Tier};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FormMode {
    Create,
    Edit { id: i64 },
}

#[derive(Debug, Serialize)]
pub struct Saved {
    pub record: LineRecord,
    pub notification: Notification,
}

/// Controlled form bound to a record-shaped draft.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LineForm {
    pub tier: Tier,
    pub mode: FormMode,
    pub values: LineDraft,
}

impl LineForm {
    pub fn create(tier: Tier) -> Self {
        Self {
            tier,
            mode: FormMode::Create,
            values: LineDraft {
                line_type: tier.line_type().to_string(),
                ..Default::default()
            },
        }
    }

    /// Pre-populated from an existing record. Derived fields are dropped.
    pub fn edit(tier: Tier, record: &LineRecord) -> Self {
        Self {
            tier,
            mode: FormMode::Edit { id: record.id },
            values: LineDraft {
                customer_name: record.customer_name.clone(),
                mobile_number: record.mobile_number.clone(),
                line_type: record.line_type.clone(),
                charging_date: record.charging_date,
                payment_status: record.payment_status,
                monthly_price: record.monthly_price,
                renewal_status: record.renewal_status,
                renewal_date: record.renewal_date,
            },
        }
    }

    pub fn title(&self) -> String {
        let label = self.tier.config().label;
        match self.mode {
            FormMode::Create => format!("Add to {label}"),
            FormMode::Edit { .. } => format!("Edit line in {label}"),
        }
    }

    /// Required inputs left empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.values.mobile_number.trim().is_empty() {
            missing.push("mobile_number");
        }
        if self.values.line_type.trim().is_empty() {
            missing.push("line_type");
        }
        missing
    }

    /// Insert or update. On failure the form stays as it was so the user
    /// can correct it.
    pub fn submit(&mut self, store: &LineStore, actor: &str) -> Result<Saved, Failure> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            let err = LinesError::Validation(format!("required: {}", missing.join(", ")));
            return Err(err.into());
        }

        let mut draft = self.values.clone();
        if !self.tier.config().tracks_renewal {
            draft.renewal_date = None;
        }

        let result = match self.mode {
            FormMode::Create => store.insert(self.tier, draft, actor).map(|r| (r, "Added", "The line was added successfully")),
            FormMode::Edit { id } => store
                .update(self.tier, id, LinePatch::replace_with(draft), actor)
                .map(|r| (r, "Updated", "The line was updated successfully")),
        };

        match result {
            Ok((record, title, description)) => {
                info!(table = %self.tier, id = record.id, mode = ?self.mode, "Form saved");
                Ok(Saved {
                    record,
                    notification: Notification::success(title, description),
                })
            }
            Err(e) => {
                warn!(table = %self.tier, error = %e, "Form save failed");
                let notification = Notification::error("Error", format!("Failed to save the line: {e}"));
                Err(Failure::new(e, notification))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use lines_core::event_bus::CaptureSink;
    use lines_core::PaymentStatus;
    use std::sync::Arc;

    fn store() -> (LineStore, Arc<CaptureSink>) {
        let sink = Arc::new(CaptureSink::new());
        (LineStore::new(sink.clone()), sink)
    }

    #[test]
    fn test_create_defaults_line_type() {
        let form = LineForm::create(Tier::Lines60);
        assert_eq!(form.values.line_type, "60");
        assert_eq!(form.mode, FormMode::Create);
        assert_eq!(form.missing_fields(), vec!["mobile_number"]);
        assert!(form.title().starts_with("Add"));
    }

    #[test]
    fn test_missing_fields_never_reach_storage() {
        let (store, sink) = store();
        let mut form = LineForm::create(Tier::Lines20);
        let failure = form.submit(&store, "admin").unwrap_err();
        assert!(matches!(failure.error, LinesError::Validation(_)));
        assert_eq!(sink.count(), 0);
        assert_eq!(store.count(Tier::Lines20), 0);
    }

    #[test]
    fn test_create_then_edit() {
        let (store, _) = store();
        let mut form = LineForm::create(Tier::Lines20);
        form.values.mobile_number = "01012345678".into();
        form.values.monthly_price = Some(120.0);
        let saved = form.submit(&store, "admin").unwrap();
        assert_eq!(saved.record.id, 1);
        assert_eq!(saved.notification.title, "Added");

        let mut edit = LineForm::edit(Tier::Lines20, &saved.record);
        assert_eq!(edit.mode, FormMode::Edit { id: 1 });
        edit.values.payment_status = PaymentStatus::Paid;
        edit.values.customer_name = None;
        let updated = edit.submit(&store, "admin").unwrap();
        assert_eq!(updated.record.payment_status, PaymentStatus::Paid);
        assert_eq!(updated.record.monthly_price, Some(120.0));
        assert_eq!(store.count(Tier::Lines20), 1);
    }

    #[test]
    fn test_customer_form_drops_renewal_date() {
        let (store, _) = store();
        let mut form = LineForm::create(Tier::Lines40);
        form.values.mobile_number = "0100".into();
        form.values.renewal_date = NaiveDate::from_ymd_opt(2025, 1, 1);
        let saved = form.submit(&store, "admin").unwrap();
        assert_eq!(saved.record.renewal_date, None);
    }

    #[test]
    fn test_storage_failure_keeps_form_open() {
        let (store, _) = store();
        let mut form = LineForm::create(Tier::Lines20);
        form.values.mobile_number = "0100".into();
        form.values.monthly_price = Some(-1.0);
        let before = form.clone();
        let failure = form.submit(&store, "admin").unwrap_err();
        assert!(matches!(failure.error, LinesError::Storage(_)));
        assert!(failure.notification.is_error());
        assert_eq!(form, before);
    }

    #[test]
    fn test_edit_of_deleted_record_fails() {
        let (store, _) = store();
        let mut form = LineForm::create(Tier::Lines60);
        form.values.mobile_number = "0100".into();
        let saved = form.submit(&store, "admin").unwrap();
        store.delete(Tier::Lines60, saved.record.id, "admin").unwrap();

        let mut edit = LineForm::edit(Tier::Lines60, &saved.record);
        let failure = edit.submit(&store, "admin").unwrap_err();
        assert!(matches!(failure.error, LinesError::NotFound { .. }));
    }
}
