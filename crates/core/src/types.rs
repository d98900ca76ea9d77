use crate::error::{LinesError, LinesResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lines renewing within this many days are flagged as due.
pub const RENEWAL_DUE_WINDOW_DAYS: i64 = 3;

/// Bandwidth class of a line. Each tier lives in its own table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    #[serde(rename = "20")]
    Lines20,
    #[serde(rename = "40")]
    Lines40,
    #[serde(rename = "60")]
    Lines60,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Lines20, Tier::Lines40, Tier::Lines60];

    /// Static configuration describing how this tier is stored and shown.
    pub fn config(self) -> &'static TierConfig {
        match self {
            Tier::Lines20 => &LINES_20,
            Tier::Lines40 => &CUSTOMERS,
            Tier::Lines60 => &LINES_60,
        }
    }

    /// The `line_type` tag records of this tier carry.
    pub fn line_type(self) -> &'static str {
        match self {
            Tier::Lines20 => "20",
            Tier::Lines40 => "40",
            Tier::Lines60 => "60",
        }
    }

    pub fn table(self) -> &'static str {
        self.config().table
    }

    /// Position in `Tier::ALL`, used to index per-tier arrays.
    pub fn index(self) -> usize {
        match self {
            Tier::Lines20 => 0,
            Tier::Lines40 => 1,
            Tier::Lines60 => 2,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

impl FromStr for Tier {
    type Err = LinesError;

    fn from_str(s: &str) -> LinesResult<Self> {
        match s.trim() {
            "20" | "lines_20" | "lines20" => Ok(Tier::Lines20),
            "40" | "customers" | "lines_40" | "lines40" => Ok(Tier::Lines40),
            "60" | "lines_60" | "lines60" => Ok(Tier::Lines60),
            other => Err(LinesError::Validation(format!("unknown tier '{other}'"))),
        }
    }
}

/// Per-tier storage and presentation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierConfig {
    pub tier: Tier,
    /// Base table that receives inserts, updates and deletes.
    pub table: &'static str,
    /// Relation the table view reads from. Tier 60 reads a computed view.
    pub read_source: &'static str,
    pub label: &'static str,
    /// Whether records of this tier carry `renewal_date` and the derived
    /// renewal fields.
    pub tracks_renewal: bool,
}

static LINES_20: TierConfig = TierConfig {
    tier: Tier::Lines20,
    table: "lines_20",
    read_source: "lines_20",
    label: "20 Mbps lines",
    tracks_renewal: true,
};

static CUSTOMERS: TierConfig = TierConfig {
    tier: Tier::Lines40,
    table: "customers",
    read_source: "customers",
    label: "40 Mbps lines",
    tracks_renewal: false,
};

static LINES_60: TierConfig = TierConfig {
    tier: Tier::Lines60,
    table: "lines_60",
    read_source: "lines_60_with_calculations",
    label: "60 Mbps lines",
    tracks_renewal: true,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PaymentStatus {
    #[serde(rename = "paid", alias = "دفع")]
    Paid,
    #[default]
    #[serde(rename = "unpaid", alias = "لم يدفع")]
    Unpaid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RenewalStatus {
    #[serde(rename = "done", alias = "تم")]
    Done,
    #[default]
    #[serde(rename = "not done", alias = "لم يتم")]
    NotDone,
}

/// One customer's subscription line, as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineRecord {
    pub id: i64,
    pub customer_name: Option<String>,
    pub mobile_number: String,
    pub line_type: String,
    pub charging_date: Option<NaiveDate>,
    pub payment_status: PaymentStatus,
    pub monthly_price: Option<f64>,
    pub renewal_status: RenewalStatus,
    #[serde(default)]
    pub renewal_date: Option<NaiveDate>,
    /// Derived by storage from `renewal_date`.
    #[serde(default)]
    pub days_until_renewal: Option<i64>,
    /// Derived by storage from `renewal_date`.
    #[serde(default)]
    pub is_renewal_due: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client-settable fields of a new line. Derived and storage-assigned
/// fields have no place here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LineDraft {
    #[serde(default)]
    pub customer_name: Option<String>,
    pub mobile_number: String,
    #[serde(default)]
    pub line_type: String,
    #[serde(default)]
    pub charging_date: Option<NaiveDate>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub monthly_price: Option<f64>,
    #[serde(default)]
    pub renewal_status: RenewalStatus,
    #[serde(default)]
    pub renewal_date: Option<NaiveDate>,
}

/// Partial update. An absent field leaves the stored value alone; an
/// explicit `null` on a nullable column clears it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LinePatch {
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<Option<String>>,
    #[serde(default)]
    pub mobile_number: Option<String>,
    #[serde(default)]
    pub line_type: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub charging_date: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub monthly_price: Option<Option<f64>>,
    #[serde(default)]
    pub renewal_status: Option<RenewalStatus>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub renewal_date: Option<Option<NaiveDate>>,
}

impl LinePatch {
    /// A patch that overwrites every client-settable column with the draft.
    pub fn replace_with(draft: LineDraft) -> Self {
        Self {
            customer_name: Some(draft.customer_name),
            mobile_number: Some(draft.mobile_number),
            line_type: Some(draft.line_type),
            charging_date: Some(draft.charging_date),
            payment_status: Some(draft.payment_status),
            monthly_price: Some(draft.monthly_price),
            renewal_status: Some(draft.renewal_status),
            renewal_date: Some(draft.renewal_date),
        }
    }

    pub fn sets_renewal_date(&self) -> bool {
        matches!(self.renewal_date, Some(Some(_)))
    }
}

/// Present-but-null maps to `Some(None)`; absence is handled by `default`.
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Projection the dashboard reads: `payment_status, renewal_status, monthly_price`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StatsRow {
    pub payment_status: PaymentStatus,
    pub renewal_status: RenewalStatus,
    pub monthly_price: Option<f64>,
}

impl From<&LineRecord> for StatsRow {
    fn from(record: &LineRecord) -> Self {
        Self {
            payment_status: record.payment_status,
            renewal_status: record.renewal_status,
            monthly_price: record.monthly_price,
        }
    }
}

/// Compute `(days_until_renewal, is_renewal_due)` for a renewal date as of `today`.
pub fn renewal_fields(renewal_date: Option<NaiveDate>, today: NaiveDate) -> (Option<i64>, Option<bool>) {
    match renewal_date {
        Some(date) => {
            let days = (date - today).num_days();
            (Some(days), Some(days <= RENEWAL_DUE_WINDOW_DAYS))
        }
        None => (None, None),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_tier_parsing_accepts_tags_and_tables() {
        assert_eq!("20".parse::<Tier>().unwrap(), Tier::Lines20);
        assert_eq!("customers".parse::<Tier>().unwrap(), Tier::Lines40);
        assert_eq!("lines_60".parse::<Tier>().unwrap(), Tier::Lines60);
        assert!("80".parse::<Tier>().is_err());
    }

    #[test]
    fn test_tier_configs() {
        assert_eq!(Tier::Lines60.config().read_source, "lines_60_with_calculations");
        assert_eq!(Tier::Lines40.table(), "customers");
        assert!(!Tier::Lines40.config().tracks_renewal);
        assert!(Tier::Lines20.config().tracks_renewal);
        for (i, tier) in Tier::ALL.iter().enumerate() {
            assert_eq!(tier.index(), i);
        }
    }

    #[test]
    fn test_status_wire_values_and_aliases() {
        let paid: PaymentStatus = serde_json::from_str("\"paid\"").unwrap();
        let paid_ar: PaymentStatus = serde_json::from_str("\"دفع\"").unwrap();
        assert_eq!(paid, PaymentStatus::Paid);
        assert_eq!(paid_ar, PaymentStatus::Paid);

        let not_done: RenewalStatus = serde_json::from_str("\"لم يتم\"").unwrap();
        assert_eq!(not_done, RenewalStatus::NotDone);
        assert_eq!(serde_json::to_string(&RenewalStatus::NotDone).unwrap(), "\"not done\"");
        assert!(serde_json::from_str::<PaymentStatus>("\"maybe\"").is_err());
    }

    #[test]
    fn test_renewal_fields() {
        let today = date(2025, 3, 10);
        assert_eq!(renewal_fields(None, today), (None, None));
        assert_eq!(renewal_fields(Some(date(2025, 3, 12)), today), (Some(2), Some(true)));
        assert_eq!(renewal_fields(Some(date(2025, 3, 10)), today), (Some(0), Some(true)));
        assert_eq!(renewal_fields(Some(date(2025, 3, 1)), today), (Some(-9), Some(true)));
        assert_eq!(renewal_fields(Some(date(2025, 4, 10)), today), (Some(31), Some(false)));
    }

    #[test]
    fn test_patch_null_clears_and_absent_keeps() {
        let patch: LinePatch = serde_json::from_value(serde_json::json!({
            "customer_name": null,
            "monthly_price": 150.0,
            "payment_status": "paid"
        }))
        .unwrap();
        assert_eq!(patch.customer_name, Some(None));
        assert_eq!(patch.monthly_price, Some(Some(150.0)));
        assert_eq!(patch.payment_status, Some(PaymentStatus::Paid));
        assert_eq!(patch.renewal_date, None);
        assert_eq!(patch.mobile_number, None);
        assert!(!patch.sets_renewal_date());
    }

    #[test]
    fn test_patch_from_draft_overwrites_everything() {
        let draft = LineDraft {
            mobile_number: "0100".into(),
            line_type: "20".into(),
            ..Default::default()
        };
        let patch = LinePatch::replace_with(draft);
        assert_eq!(patch.mobile_number.as_deref(), Some("0100"));
        assert_eq!(patch.customer_name, Some(None));
        assert!(!patch.sets_renewal_date());
    }
}
