pub mod money;
pub mod record;
pub mod site;
pub mod store;

pub use money::Money;
pub use record::{BillingRecord, RecordDraft, RecordFilter, RecordWithSite, UpsertOutcome};
pub use site::{nice_url, Client, ClientId, Site, SiteId};
pub use store::{
    RecordStore, SettingsStore, SiteDirectory, SETTING_IMPORT_MESSAGE, SETTING_LAST_IMPORTED,
};
