use anyhow::Result;
use log::info;

use crate::{
    mapping::MappingSpec,
    profile::MappingProfile,
    store::ProfileSource,
    table,
};

/// Lists active profiles with their resolved mappings. Read-only.
pub fn execute<S: ProfileSource>(store: &mut S) -> Result<()> {
    let profiles = store.list_active_profiles()?;
    let mut rows = Vec::with_capacity(profiles.len());
    for profile in &profiles {
        let rules = store.list_field_rules(profile.id)?;
        rows.push(profile_row(profile, &MappingSpec::resolve(&rules)));
    }
    let headers = ["Profile", "Kind", "Header", "Delimiter", "Pattern", "Fields"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    print!("{}", table::render_table(&headers, &rows));
    info!("Listed {} active profile(s)", profiles.len());
    Ok(())
}

fn profile_row(profile: &MappingProfile, mapping: &MappingSpec) -> Vec<String> {
    let fields = if mapping.is_empty() {
        "(none)".to_string()
    } else {
        mapping.describe()
    };
    vec![
        profile.id.to_string(),
        format!("{:?}", profile.file_kind).to_lowercase(),
        if profile.has_header() { "yes" } else { "no" }.to_string(),
        profile.delimiter_label(),
        profile.path_pattern.clone(),
        fields,
    ]
}
