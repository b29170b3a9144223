//! Drives a load run: profiles, then their files, one at a time.
//!
//! Each file goes through read, project and load. A failure in any of those
//! steps is logged with the profile and file and the run moves on. Profiles
//! without rules or without matching files are skipped with a warning. Every
//! file load clears the shared target table first, so when a profile matches
//! several files only the last one loaded remains in the table.

use std::{
    path::Path,
    time::{Duration, Instant},
};

use encoding_rs::Encoding;
use itertools::Itertools;
use log::{error, info, warn};

use crate::{
    config::LoaderConfig,
    error::{LoadError, Severity},
    io_utils, locate,
    loader::{LoadStrategy, strategy_for},
    mapping::MappingSpec,
    profile::MappingProfile,
    projector,
    reader::{self, ReadOptions},
    store::{PriceSink, ProfileSource},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub profiles_seen: usize,
    /// Skipped for configuration reasons: no rules or no files.
    pub profiles_skipped: usize,
    /// Could not be processed at all, e.g. the rule query failed.
    pub profiles_failed: usize,
    pub files_loaded: usize,
    pub files_failed: usize,
    pub rows_loaded: usize,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.files_failed == 0 && self.profiles_failed == 0
    }

    /// 0 when every file loaded, 2 when the run finished with failures.
    pub fn exit_code(&self) -> i32 {
        if self.is_clean() { 0 } else { 2 }
    }
}

pub struct Orchestrator {
    strategy: Box<dyn LoadStrategy>,
    encoding: &'static Encoding,
}

impl Orchestrator {
    pub fn new(config: &LoaderConfig) -> Result<Self, LoadError> {
        let encoding = io_utils::resolve_encoding(&config.input_encoding)
            .map_err(|err| LoadError::Config(err.to_string()))?;
        Ok(Self::with_strategy(
            strategy_for(
                config.strategy,
                config.batch_size,
                config.staging_dir.clone(),
            ),
            encoding,
        ))
    }

    pub fn with_strategy(strategy: Box<dyn LoadStrategy>, encoding: &'static Encoding) -> Self {
        Self { strategy, encoding }
    }

    /// Runs every active profile. Only a fatal error (or a failed profile
    /// fetch) ends the run early.
    pub fn run<S>(&self, store: &mut S) -> Result<RunSummary, LoadError>
    where
        S: ProfileSource + PriceSink,
    {
        let started = Instant::now();
        let profiles = store
            .list_active_profiles()
            .map_err(LoadError::store("list profiles"))?;
        let mut summary = RunSummary {
            profiles_seen: profiles.len(),
            ..RunSummary::default()
        };
        if profiles.is_empty() {
            warn!("{}", LoadError::NoActiveProfiles);
        }
        info!(
            "Loading {} profile(s) with the {} strategy",
            profiles.len(),
            self.strategy.name()
        );

        for profile in &profiles {
            match self.run_profile(profile, store, &mut summary) {
                Ok(()) => {}
                Err(err) if err.severity() == Severity::Fatal => return Err(err),
                Err(
                    err @ (LoadError::NoFieldRules { .. } | LoadError::NoMatchingFiles { .. }),
                ) => {
                    warn!("profile={} skipped: {err}", profile.id);
                    summary.profiles_skipped += 1;
                }
                Err(err) => {
                    error!("profile={} failed: {err}", profile.id);
                    summary.profiles_failed += 1;
                }
            }
        }

        info!(
            "Run finished in {}: {} profile(s), {} skipped, {} failed; {} file(s) loaded, {} failed; {} row(s) loaded",
            format_elapsed(started.elapsed()),
            summary.profiles_seen,
            summary.profiles_skipped,
            summary.profiles_failed,
            summary.files_loaded,
            summary.files_failed,
            summary.rows_loaded
        );
        Ok(summary)
    }

    fn run_profile<S>(
        &self,
        profile: &MappingProfile,
        store: &mut S,
        summary: &mut RunSummary,
    ) -> Result<(), LoadError>
    where
        S: ProfileSource + PriceSink,
    {
        let rules = store
            .list_field_rules(profile.id)
            .map_err(LoadError::store("list field rules"))?;
        if rules.is_empty() {
            return Err(LoadError::NoFieldRules {
                profile_id: profile.id,
            });
        }
        let mapping = MappingSpec::resolve(&rules);

        let files = locate::match_files(&profile.path_pattern)?;
        if files.is_empty() {
            return Err(LoadError::NoMatchingFiles {
                pattern: profile.path_pattern.clone(),
            });
        }

        info!(
            "profile={} kind={:?} header={} delimiter='{}' fields=[{}] files=[{}]",
            profile.id,
            profile.file_kind,
            profile.has_header(),
            profile.delimiter_label(),
            mapping.describe(),
            files.iter().map(|f| f.display()).join(", ")
        );

        for file in &files {
            match self.load_file(profile, &mapping, file, store) {
                Ok(rows) => {
                    summary.files_loaded += 1;
                    summary.rows_loaded += rows;
                    info!(
                        "profile={} file={} loaded {rows} row(s)",
                        profile.id,
                        file.display()
                    );
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    summary.files_failed += 1;
                    error!(
                        "profile={} file={} failed: {err}",
                        profile.id,
                        file.display()
                    );
                }
            }
        }
        Ok(())
    }

    fn load_file(
        &self,
        profile: &MappingProfile,
        mapping: &MappingSpec,
        path: &Path,
        sink: &mut dyn PriceSink,
    ) -> Result<usize, LoadError> {
        let read_error = |cause| LoadError::Read {
            path: path.to_path_buf(),
            cause,
        };
        let options = ReadOptions {
            kind: profile.file_kind,
            delimiter: profile.delimiter_byte().map_err(read_error)?,
            has_header: profile.has_header(),
            encoding: self.encoding,
        };

        let started = Instant::now();
        let raw = reader::read_table(path, &options).map_err(|cause| LoadError::Read {
            path: path.to_path_buf(),
            cause,
        })?;
        info!(
            "profile={} file={} read {} row(s) in {}",
            profile.id,
            path.display(),
            raw.row_count(),
            format_elapsed(started.elapsed())
        );

        let projection = projector::project(&raw, mapping)?;
        let stats = projection.stats;
        if stats.dropped_empty_key > 0 || stats.rejected_rows > 0 {
            warn!(
                "profile={} file={} dropped {} row(s) without key, rejected {} row(s)",
                profile.id,
                path.display(),
                stats.dropped_empty_key,
                stats.rejected_rows
            );
        }

        let started = Instant::now();
        let report = self.strategy.load(&projection.table, sink)?;
        info!(
            "profile={} file={} {} load of {} row(s) in {} batch(es) took {}",
            profile.id,
            path.display(),
            self.strategy.name(),
            report.rows,
            report.batches,
            format_elapsed(started.elapsed())
        );
        Ok(report.rows)
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        elapsed.subsec_millis()
    )
}
