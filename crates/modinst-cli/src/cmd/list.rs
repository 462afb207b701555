use anyhow::{Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::{ContentArrangement, Table};
use modinst_core::{ModuleStore, Settings};

/// List installed modules recorded in the manifest
pub fn list(settings: &Settings) -> Result<()> {
    let store = ModuleStore::load(&settings.modules_dir).with_context(|| {
        format!(
            "Failed to read module manifest in {}",
            settings.modules_dir.display()
        )
    })?;

    let Some(table) = render(&store) else {
        println!();
        println!("  No modules installed.");
        println!("  Run 'modinst install' to get started.");
        return Ok(());
    };

    println!("{table}");
    Ok(())
}

/// Table of every non-root record, or `None` if there is nothing to show.
pub fn render(store: &ModuleStore) -> Option<Table> {
    let mut rows = store.records().filter(|r| !r.is_root()).peekable();
    rows.peek()?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["MODULE", "SOURCE", "VERSION", "DIRECTORY"]);

    for record in rows {
        table.add_row(vec![
            record.key.clone(),
            record.source_addr.clone(),
            record
                .version
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string),
            record.dir.display().to_string(),
        ]);
    }

    Some(table)
}
