use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::Utc;
use thiserror::Error;
use tracing::warn;

use billmap_core::{Money, RecordDraft, RecordStore, Site, UpsertOutcome};

use crate::mapper::SiteLookup;
use crate::util::{clean_field, parse_date_lenient};

/// Logical columns a billing export must carry. Header matching is
/// case-insensitive after trimming, column order does not matter, and extra
/// columns are ignored.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "Template Name",
    "Previous date",
    "Next Date",
    "Name",
    "Amount",
];

/// Aggregate counts from one import run.
///
/// `skipped` mixes two things on purpose: malformed rows and rows whose
/// update turned out to be a no-op. That is how the counts have always been
/// reported to operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ImportStats {
    pub added: u64,
    pub updated: u64,
    pub skipped: u64,
    pub removed: u64,
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("failed to read the import file: {0}")]
    FileUnreadable(#[from] std::io::Error),
    #[error("the file is empty or its header row could not be read")]
    EmptyFile,
    #[error("missing required column in CSV: {0}")]
    MissingColumn(String),
    #[error("record store failure: {0}")]
    Store(String),
}

/// Reconciles a recurring-billing CSV export against the record store.
///
/// Each run upserts every usable row, then deletes stored records whose
/// template name the CSV no longer mentions, so the store always mirrors the
/// latest export. Rows are streamed; the file is never held in memory whole.
pub struct CsvImporter {
    lookup: SiteLookup,
}

impl CsvImporter {
    /// Builds the importer's site lookup table from the directory's sites.
    /// `sites` must arrive in the directory's stable order; the lookup's
    /// containment matching is order-sensitive.
    pub fn new(sites: &[Site]) -> Self {
        CsvImporter {
            lookup: SiteLookup::build(sites),
        }
    }

    /// Imports the CSV file at `path`, stamping touched records with the
    /// current time.
    pub async fn import_path<S: RecordStore>(
        &self,
        store: &S,
        path: &Path,
    ) -> Result<ImportStats, ImportError> {
        let file = File::open(path)?;
        self.import_reader(store, file, Utc::now().timestamp()).await
    }

    /// Imports CSV data from `reader`, stamping every added or updated
    /// record with `imported_at` (unix seconds). Split out from
    /// [`Self::import_path`] so runs are reproducible under test.
    pub async fn import_reader<S: RecordStore, R: Read>(
        &self,
        store: &S,
        reader: R,
        imported_at: i64,
    ) -> Result<ImportStats, ImportError> {
        // Headers are matched by hand below; `flexible` because exports in
        // the wild pad or truncate rows and short rows are a skip, not an
        // abort.
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut rows = csv_reader.byte_records();

        let header = match rows.next() {
            Some(Ok(record)) if record.iter().any(|field| !field.is_empty()) => record,
            _ => return Err(ImportError::EmptyFile),
        };
        let columns = resolve_columns(&header)?;

        let mut stats = ImportStats::default();
        let mut processed: HashSet<String> = HashSet::new();

        for row in rows {
            let row = match row {
                Ok(record) => record,
                Err(err) => {
                    warn!("skipping unreadable CSV row: {err}");
                    stats.skipped += 1;
                    continue;
                }
            };

            if row.len() < header.len() {
                stats.skipped += 1;
                continue;
            }

            let template_name = clean_field(row.get(columns.template_name));
            let client_name = clean_field(row.get(columns.client_name));
            if template_name.is_empty() || client_name.is_empty() {
                stats.skipped += 1;
                continue;
            }

            // A usable row's name always counts as seen: a failed write
            // below must not let the reconcile pass delete a record the
            // export still names.
            processed.insert(template_name.clone());

            let previous_date = parse_date_lenient(&clean_field(row.get(columns.previous_date)));
            let next_date = parse_date_lenient(&clean_field(row.get(columns.next_date)));
            let amount = Money::parse_lenient(&clean_field(row.get(columns.amount)));

            // A failing lookup is terminal: a store that cannot even be
            // read would misclassify every row that follows.
            let existing = store
                .find_by_template(&template_name)
                .await
                .map_err(|err| ImportError::Store(err.to_string()))?;

            match existing {
                Some(existing) => {
                    // A mapping already on the record, manual or from an
                    // earlier import, is never overwritten by the mapper.
                    let site_id = if existing.site_id.is_mapped() {
                        existing.site_id
                    } else {
                        self.lookup.resolve(&client_name)
                    };
                    let draft = RecordDraft {
                        template_name,
                        client_name,
                        previous_date,
                        next_date,
                        amount,
                        site_id,
                        last_imported: imported_at,
                    };
                    match store.upsert(&draft).await {
                        Ok(UpsertOutcome::Changed) => stats.updated += 1,
                        Ok(UpsertOutcome::Unchanged) => stats.skipped += 1,
                        Err(err) => {
                            warn!(template = %draft.template_name, "update failed, row not counted: {err}");
                        }
                    }
                }
                None => {
                    let draft = RecordDraft {
                        template_name,
                        client_name: client_name.clone(),
                        previous_date,
                        next_date,
                        amount,
                        site_id: self.lookup.resolve(&client_name),
                        last_imported: imported_at,
                    };
                    match store.insert(&draft).await {
                        Ok(_) => stats.added += 1,
                        Err(err) => {
                            warn!(template = %draft.template_name, "insert failed, row not counted: {err}");
                        }
                    }
                }
            }
        }

        // Reconcile: anything the export no longer mentions goes away. An
        // import that saw no usable rows must never wipe the store.
        if !processed.is_empty() {
            let keep: Vec<String> = processed.into_iter().collect();
            match store.delete_templates_not_in(&keep).await {
                Ok(removed) => stats.removed = removed,
                Err(err) => {
                    warn!("reconcile delete failed, stale records may remain: {err}");
                }
            }
        }

        Ok(stats)
    }
}

struct ColumnIndexes {
    template_name: usize,
    previous_date: usize,
    next_date: usize,
    client_name: usize,
    amount: usize,
}

/// Locates each required column in the header, case-insensitively and after
/// trimming. The error names the column exactly as documented so the
/// operator can fix the export.
fn resolve_columns(header: &csv::ByteRecord) -> Result<ColumnIndexes, ImportError> {
    let normalized: Vec<String> = header
        .iter()
        .map(|field| String::from_utf8_lossy(field).trim().to_lowercase())
        .collect();

    let find = |wanted: &str| -> Result<usize, ImportError> {
        normalized
            .iter()
            .position(|h| h == &wanted.to_lowercase())
            .ok_or_else(|| ImportError::MissingColumn(wanted.to_string()))
    };

    Ok(ColumnIndexes {
        template_name: find(REQUIRED_COLUMNS[0])?,
        previous_date: find(REQUIRED_COLUMNS[1])?,
        next_date: find(REQUIRED_COLUMNS[2])?,
        client_name: find(REQUIRED_COLUMNS[3])?,
        amount: find(REQUIRED_COLUMNS[4])?,
    })
}
