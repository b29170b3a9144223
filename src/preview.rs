use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::PreviewArgs,
    io_utils,
    mapping::MappingSpec,
    profile::ProfileDocument,
    projector,
    reader::{self, ReadOptions},
    table,
};

/// Reads one file with a YAML-described profile, projects it and prints the
/// first rows. Nothing is written to the store.
pub fn execute(args: &PreviewArgs) -> Result<()> {
    let document = ProfileDocument::load(&args.profile)
        .with_context(|| format!("Loading profile from {:?}", args.profile))?;
    let encoding = io_utils::resolve_encoding(
        args.input_encoding
            .as_deref()
            .unwrap_or(io_utils::DEFAULT_INPUT_ENCODING),
    )?;
    let profile = &document.profile;
    let mapping = MappingSpec::resolve(&document.rules);
    info!(
        "Previewing {:?} with profile {} ({})",
        args.input,
        profile.id,
        mapping.describe()
    );

    let options = ReadOptions {
        kind: profile.file_kind,
        delimiter: profile.delimiter_byte()?,
        has_header: profile.has_header(),
        encoding,
    };
    let raw = reader::read_table(&args.input, &options)
        .with_context(|| format!("Reading {:?}", args.input))?;
    let projection = projector::project(&raw, &mapping)?;

    print!("{}", table::render_projection(&projection.table, args.rows));
    info!(
        "Projected {} of {} row(s): {} without key, {} rejected; showing {}",
        projection.table.len(),
        projection.stats.input_rows,
        projection.stats.dropped_empty_key,
        projection.stats.rejected_rows,
        projection.table.len().min(args.rows)
    );
    Ok(())
}
