use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::money::Money;
use super::site::{ClientId, SiteId};

/// One recurring billing template, keyed by its unique `template_name`.
///
/// `last_imported` is the unix timestamp of the most recent import run that
/// touched the record; zero means it predates timestamping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRecord {
    pub id: i64,
    pub template_name: String,
    pub client_name: String,
    pub previous_date: NaiveDate,
    pub next_date: NaiveDate,
    pub amount: Money,
    pub site_id: SiteId,
    pub last_imported: i64,
}

/// Field payload for an insert or update; the store assigns the row id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDraft {
    pub template_name: String,
    pub client_name: String,
    pub previous_date: NaiveDate,
    pub next_date: NaiveDate,
    pub amount: Money,
    pub site_id: SiteId,
    pub last_imported: i64,
}

impl RecordDraft {
    /// Applies the draft to an existing record, keeping its id.
    pub fn into_record(self, id: i64) -> BillingRecord {
        BillingRecord {
            id,
            template_name: self.template_name,
            client_name: self.client_name,
            previous_date: self.previous_date,
            next_date: self.next_date,
            amount: self.amount,
            site_id: self.site_id,
            last_imported: self.last_imported,
        }
    }
}

/// Whether an update actually altered the stored row. Stores detect this at
/// the row level so an identical re-import reads as no change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Changed,
    Unchanged,
}

/// Filters for [`crate::RecordStore::query`]; all present fields are ANDed.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Exact match on the record's imported client name.
    pub client_name: Option<String>,
    /// Records mapped to this specific site.
    pub site_id: Option<SiteId>,
    /// `Some(true)` keeps mapped records, `Some(false)` unmapped only.
    pub is_mapped: Option<bool>,
    /// Records whose mapped site belongs to this directory client.
    pub client_id: Option<ClientId>,
}

/// A record together with its mapped site's directory fields. The site side
/// is absent for unmapped records and for mappings whose site has left the
/// directory.
#[derive(Debug, Clone, Serialize)]
pub struct RecordWithSite {
    pub record: BillingRecord,
    pub site_name: Option<String>,
    pub site_url: Option<String>,
    pub site_client_id: Option<ClientId>,
}
