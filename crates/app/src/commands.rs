//! One function per CLI command. Output is plain text for operators; the
//! record listing can emit JSON for scripting.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{Local, TimeZone, Utc};
use serde::Deserialize;

use billmap_core::{
    nice_url, Client, RecordFilter, RecordStore, RecordWithSite, SettingsStore, Site,
    SiteDirectory, SiteId, SETTING_IMPORT_MESSAGE, SETTING_LAST_IMPORTED,
};
use billmap_import::CsvImporter;
use billmap_storage::SqliteStore;

/// Shape of the site directory feed consumed by `sites sync`.
#[derive(Debug, Deserialize)]
struct DirectoryFeed {
    sites: Vec<Site>,
    #[serde(default)]
    clients: Vec<Client>,
}

/// Runs the importer against `file`, then records the outcome in settings so
/// `status` can report it later.
pub async fn import(store: &SqliteStore, file: &Path) -> Result<()> {
    let sites = store.sites().await?;
    let importer = CsvImporter::new(&sites);

    match importer.import_path(store, file).await {
        Ok(stats) => {
            let message = format!(
                "Import successful! Records added: {}, Updated: {}, Removed: {}, Skipped: {}",
                stats.added, stats.updated, stats.removed, stats.skipped
            );
            store
                .set_setting(SETTING_LAST_IMPORTED, &Utc::now().timestamp().to_string())
                .await?;
            store.set_setting(SETTING_IMPORT_MESSAGE, &message).await?;
            tracing::info!("{message}");
            println!("{message}");
            Ok(())
        }
        Err(err) => {
            let message = format!("Import failed: {err}");
            store.set_setting(SETTING_IMPORT_MESSAGE, &message).await?;
            tracing::info!("{message}");
            bail!(message);
        }
    }
}

/// Lists records, mapped section first, in the store's client-name order
/// within each section.
pub async fn records(store: &SqliteStore, filter: &RecordFilter, json: bool) -> Result<()> {
    let rows = store.query(filter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No billing records matched.");
        let known = store.client_names().await?;
        if !known.is_empty() {
            println!("Known clients: {}", known.join(", "));
        }
        return Ok(());
    }

    let (mapped, unmapped): (Vec<_>, Vec<_>) = rows
        .into_iter()
        .partition(|row| row.record.site_id.is_mapped());

    if !mapped.is_empty() {
        println!("Mapped ({}):", mapped.len());
        for row in &mapped {
            print_record(row);
        }
    }
    if !unmapped.is_empty() {
        println!("Unmapped ({}):", unmapped.len());
        for row in &unmapped {
            print_record(row);
        }
    }
    Ok(())
}

fn print_record(row: &RecordWithSite) {
    let record = &row.record;
    let site = match &row.site_name {
        Some(name) => name.clone(),
        // A mapped record whose site left the directory still shows its id.
        None if record.site_id.is_mapped() => format!("site {}", record.site_id),
        None => "-".to_string(),
    };
    println!(
        "  #{:<4} {:<28} {:<24} {:>10}  next {}  {}",
        record.id,
        record.template_name,
        record.client_name,
        record.amount.to_string(),
        record.next_date,
        site
    );
}

/// Manual mapping override. Unlike the importer's auto-mapper this always
/// writes, and site id 0 clears the mapping.
pub async fn map(store: &SqliteStore, record_id: i64, site_id: i64) -> Result<()> {
    if record_id <= 0 {
        bail!("record id must be positive");
    }
    if site_id < 0 {
        bail!("site id must be 0 (unmap) or a directory site id");
    }

    let affected = store.set_site_mapping(record_id, SiteId(site_id)).await?;
    tracing::info!("mapping updated, rows affected: {affected}");
    println!("Mapping updated successfully.");
    Ok(())
}

/// The overview report: directory sites with no billing record mapped to
/// them.
pub async fn missing(store: &SqliteStore) -> Result<()> {
    let sites = store.sites().await?;
    let mapped: HashSet<SiteId> = store.mapped_site_ids().await?.into_iter().collect();

    let unmapped: Vec<&Site> = sites
        .iter()
        .filter(|site| !mapped.contains(&site.id))
        .collect();

    if unmapped.is_empty() {
        println!("All sites have an associated recurring billing record.");
        return Ok(());
    }

    if unmapped.len() == 1 {
        println!("There is 1 site without recurring billing:");
    } else {
        println!("There are {} sites without recurring billing:", unmapped.len());
    }
    for site in unmapped {
        println!("  #{:<4} {:<28} {}", site.id.0, site.name, nice_url(&site.url));
    }
    Ok(())
}

/// Shows the last-import timestamp and relays any stored import message,
/// clearing the message once shown.
pub async fn status(store: &SqliteStore) -> Result<()> {
    let last_imported = store
        .get_setting(SETTING_LAST_IMPORTED)
        .await?
        .and_then(|raw| raw.parse::<i64>().ok())
        .filter(|ts| *ts > 0);

    match last_imported.and_then(|ts| Local.timestamp_opt(ts, 0).single()) {
        Some(when) => println!("Last imported: {}", when.format("%Y-%m-%d %H:%M:%S")),
        None => println!("Never imported."),
    }

    if let Some(message) = store.get_setting(SETTING_IMPORT_MESSAGE).await? {
        if !message.is_empty() {
            println!("{message}");
            store.set_setting(SETTING_IMPORT_MESSAGE, "").await?;
        }
    }
    Ok(())
}

/// Deletes every imported record and resets the import timestamp. The site
/// directory mirror is left alone.
pub async fn clear(store: &SqliteStore) -> Result<()> {
    store.clear_all().await?;
    store.set_setting(SETTING_LAST_IMPORTED, "0").await?;
    println!("All billing data cleared successfully.");
    Ok(())
}

/// Replaces the site and client mirror from a JSON feed file.
pub async fn sites_sync(store: &SqliteStore, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading site feed {}", file.display()))?;
    let feed: DirectoryFeed = serde_json::from_str(&raw).context("parsing site feed")?;

    store.replace_sites(&feed.sites).await?;
    store.replace_clients(&feed.clients).await?;

    println!(
        "Directory synced: {} sites, {} clients.",
        feed.sites.len(),
        feed.clients.len()
    );
    Ok(())
}

pub async fn sites_list(store: &SqliteStore) -> Result<()> {
    let sites = store.sites().await?;

    if sites.is_empty() {
        println!("The site directory is empty. Run `billmap sites sync <feed.json>`.");
        return Ok(());
    }
    for site in &sites {
        println!(
            "  #{:<4} {:<28} {:<32} client {}",
            site.id.0,
            site.name,
            nice_url(&site.url),
            site.client_id
        );
    }

    let clients = store.clients().await?;
    if !clients.is_empty() {
        println!("Clients:");
        for client in &clients {
            println!("  #{:<4} {}", client.id.0, client.name);
        }
    }
    Ok(())
}
