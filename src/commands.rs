//! Subcommand implementations.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use marc_catalog::filter::{ReplaceFilters, ReplaceRequest};
use marc_catalog::{report, Catalog, CatalogConfig, Progress, RecordId};
use tracing::info;

use crate::cli::ReplaceArgs;

const PROGRESS_EVERY: usize = 1000;

fn log_progress(operation: &'static str) -> impl FnMut(Progress) {
    move |progress| match progress {
        Progress::Processed(count) if count % PROGRESS_EVERY == 0 => {
            info!(operation, count, "progress");
        },
        Progress::Committing => info!(operation, "committing"),
        _ => {},
    }
}

pub fn open(config: &CatalogConfig) -> Result<Catalog> {
    Catalog::open(config)
        .with_context(|| format!("failed to open catalog {}", config.database.display()))
}

pub fn run_init(config: &CatalogConfig) -> Result<()> {
    let catalog = open(config)?;
    println!(
        "catalog {} ready ({} records)",
        config.database.display(),
        catalog.record_count()?
    );
    Ok(())
}

pub fn run_import(config: &CatalogConfig, file: &Path) -> Result<()> {
    let mut catalog = open(config)?;
    let summary = catalog
        .import_file(file, log_progress("import"))
        .with_context(|| format!("failed to import {}", file.display()))?;
    println!(
        "imported {} records ({} fields, {} subfields), skipped {}, {} warnings",
        summary.records, summary.fields, summary.subfields, summary.skipped, summary.warnings
    );
    Ok(())
}

pub fn run_export(config: &CatalogConfig, file: &Path, ids: &[RecordId]) -> Result<()> {
    let catalog = open(config)?;
    let selection = if ids.is_empty() { None } else { Some(ids) };
    let written = catalog
        .export_file(file, selection, log_progress("export"))
        .with_context(|| format!("failed to export to {}", file.display()))?;
    println!("exported {written} records to {}", file.display());
    Ok(())
}

pub fn run_list(config: &CatalogConfig, csv: bool) -> Result<()> {
    let catalog = open(config)?;
    let records = catalog.list_records()?;
    let stdout = io::stdout().lock();
    if csv {
        report::write_csv(stdout, &records)?;
    } else {
        report::write_table(stdout, &records)?;
    }
    Ok(())
}

pub fn run_show(config: &CatalogConfig, id: RecordId, json: bool) -> Result<()> {
    let catalog = open(config)?;
    let mut stdout = io::stdout().lock();
    if json {
        let record = catalog.record(id)?;
        serde_json::to_writer_pretty(&mut stdout, &record)?;
        writeln!(stdout)?;
    } else {
        writeln!(stdout, "{}", catalog.preview_text(id)?)?;
    }
    Ok(())
}

pub fn run_replace(config: &CatalogConfig, args: ReplaceArgs) -> Result<()> {
    let mut catalog = open(config)?;
    let filters = ReplaceFilters::new()
        .tags(args.tags)
        .indicator1(args.indicator1)
        .indicator2(args.indicator2)
        .codes(args.codes);
    let request = ReplaceRequest::new(args.find, args.replacement)
        .with_filters(filters)
        .case_sensitive(!args.ignore_case);
    let changed = catalog
        .apply_filtered_replace(&request, log_progress("replace"))
        .context("replace failed; no rows were changed")?;
    println!("updated {changed} subfields");
    Ok(())
}

pub fn run_rebuild(config: &CatalogConfig, id: Option<RecordId>) -> Result<()> {
    let mut catalog = open(config)?;
    let updated = catalog.rebuild_summaries(id)?;
    println!("rebuilt {updated} summaries");
    Ok(())
}

pub fn run_delete(config: &CatalogConfig, id: RecordId) -> Result<()> {
    let mut catalog = open(config)?;
    let plan = catalog.delete_record(id)?;
    println!(
        "deleted record {id} ({} fields, {} subfields)",
        plan.field_ids.len(),
        plan.subfield_ids.len()
    );
    Ok(())
}

pub fn run_clear(config: &CatalogConfig, reset: bool) -> Result<()> {
    let mut catalog = open(config)?;
    if reset {
        catalog.reset()?;
        println!("catalog reset");
    } else {
        let removed = catalog.clear()?;
        println!("removed {removed} records");
    }
    Ok(())
}
