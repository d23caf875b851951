//! The store traits the importer and CLI are written against.
//!
//! `billmap-storage` provides the SQLite implementation; tests substitute
//! lighter doubles. All methods return `Send` futures so callers can run on a
//! multi-threaded async runtime.

use std::future::Future;

use crate::record::{BillingRecord, RecordDraft, RecordFilter, RecordWithSite, UpsertOutcome};
use crate::site::{Client, Site, SiteId};

/// Settings key holding the unix timestamp of the last successful import.
pub const SETTING_LAST_IMPORTED: &str = "last_imported_timestamp";
/// Settings key holding a deferred status line from the last import attempt.
/// Written by the import workflow, read and cleared by `status`.
pub const SETTING_IMPORT_MESSAGE: &str = "import_message";

/// Persistence for billing records.
pub trait RecordStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Look up a record by its exact template name.
    fn find_by_template<'a>(
        &'a self,
        template_name: &'a str,
    ) -> impl Future<Output = Result<Option<BillingRecord>, Self::Error>> + Send + 'a;

    /// Insert a new record and return the id the store assigned.
    fn insert<'a>(
        &'a self,
        draft: &'a RecordDraft,
    ) -> impl Future<Output = Result<i64, Self::Error>> + Send + 'a;

    /// Update the record whose template name matches the draft's.
    ///
    /// Change detection is the store's job: `Unchanged` means every stored
    /// field already equalled the draft, including `last_imported`.
    fn upsert<'a>(
        &'a self,
        draft: &'a RecordDraft,
    ) -> impl Future<Output = Result<UpsertOutcome, Self::Error>> + Send + 'a;

    /// Delete every record whose template name is not in `keep`, returning
    /// how many went away. An empty `keep` deletes nothing; the reconcile
    /// pass must never wipe the table because an import produced no rows.
    fn delete_templates_not_in<'a>(
        &'a self,
        keep: &'a [String],
    ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

    /// Fetch records with their mapped site's directory fields joined in,
    /// ordered by client name.
    fn query<'a>(
        &'a self,
        filter: &'a RecordFilter,
    ) -> impl Future<Output = Result<Vec<RecordWithSite>, Self::Error>> + Send + 'a;

    /// Overwrite a record's site mapping unconditionally. This is the manual
    /// override path, also used with [`SiteId::NONE`] to unmap. Returns the
    /// number of rows altered; zero means the record was absent or already
    /// mapped exactly there, and either way the mapping now reads as asked.
    fn set_site_mapping(
        &self,
        record_id: i64,
        site_id: SiteId,
    ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

    /// Every distinct site id currently mapped by at least one record.
    fn mapped_site_ids(&self)
        -> impl Future<Output = Result<Vec<SiteId>, Self::Error>> + Send + '_;

    /// Distinct client names across all records, sorted.
    fn client_names(&self) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

    /// Remove every record. Irreversible; confirmation is the caller's job.
    fn clear_all(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

/// Key-value settings persistence for workflow state.
pub trait SettingsStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn get_setting<'a>(
        &'a self,
        key: &'a str,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;

    fn set_setting<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// Read-only view of the externally-managed site directory.
pub trait SiteDirectory: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// All known sites, in a stable order. The auto-mapper builds its lookup
    /// table in this order and its containment pass is order-sensitive.
    fn sites(&self) -> impl Future<Output = Result<Vec<Site>, Self::Error>> + Send + '_;

    /// All known clients, ordered by name.
    fn clients(&self) -> impl Future<Output = Result<Vec<Client>, Self::Error>> + Send + '_;
}
