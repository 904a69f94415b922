use crate::config::ExistingDirPolicy;
use crate::core::table::write_csv;
use crate::types::{ZonalError, ZonalResult};
use polars::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Make a site name safe to embed in a file name
pub fn sanitize_site_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

/// `{site}_{collection}_{code}_zonal_stats.csv`, or `{site}_{code}_zonal_stats.csv`
pub fn export_file_name(site: &str, collection_id: Option<&str>, code: &str) -> String {
    let site = sanitize_site_name(site);
    match collection_id {
        Some(collection) if !collection.is_empty() => {
            format!("{}_{}_{}_zonal_stats.csv", site, collection, code)
        }
        _ => format!("{}_{}_zonal_stats.csv", site, code),
    }
}

/// Apply the existing directory policy to an output directory.
///
/// `Replace` deletes the directory with everything in it. Nothing is touched
/// on a dry run.
pub fn prepare_output_dir(path: &Path, policy: ExistingDirPolicy, dry_run: bool) -> ZonalResult<()> {
    if path.exists() {
        match policy {
            ExistingDirPolicy::Fail => {
                return Err(ZonalError::Config(format!(
                    "Output directory already exists: {} (use --overwrite or reuse it explicitly)",
                    path.display()
                )));
            }
            ExistingDirPolicy::Reuse => {
                log::info!("Reusing output directory {}", path.display());
                return Ok(());
            }
            ExistingDirPolicy::Replace => {
                if dry_run {
                    log::info!("[dry run] would replace {}", path.display());
                    return Ok(());
                }
                log::warn!("Removing existing output directory {}", path.display());
                fs::remove_dir_all(path)?;
            }
        }
    }

    if dry_run {
        log::info!("[dry run] would create {}", path.display());
        return Ok(());
    }
    fs::create_dir_all(path)?;
    log::debug!("Created output directory {}", path.display());
    Ok(())
}

/// Writes one CSV per site of an assembled time series
#[derive(Debug, Clone)]
pub struct SiteExporter {
    output_dir: PathBuf,
    collection_id: Option<String>,
    code: String,
    dry_run: bool,
}

impl SiteExporter {
    pub fn new(output_dir: impl Into<PathBuf>, collection_id: Option<String>, code: &str) -> Self {
        Self {
            output_dir: output_dir.into(),
            collection_id,
            code: code.to_string(),
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Path the rows of `site` are written to
    pub fn site_path(&self, site: &str) -> PathBuf {
        self.output_dir
            .join(export_file_name(site, self.collection_id.as_deref(), &self.code))
    }

    /// Partition by site and write each partition, returning the file paths.
    ///
    /// The output directory must already exist. A site whose file name is
    /// already taken by another site gets `_uid{first uid}` appended to its
    /// site part.
    pub fn export(&self, table: &DataFrame) -> ZonalResult<Vec<PathBuf>> {
        if !self.dry_run && !self.output_dir.is_dir() {
            return Err(ZonalError::MissingOutputDir(self.output_dir.clone()));
        }
        if table.height() == 0 {
            log::warn!("No rows to export for {}", self.code);
            return Ok(Vec::new());
        }

        let mut owners: HashMap<PathBuf, String> = HashMap::new();
        let mut written = Vec::new();
        for mut rows in table.partition_by_stable(["site"], true)? {
            let site = rows.column("site")?.str()?.get(0).unwrap_or_default().to_string();
            let path = self.unique_site_path(&site, &rows, &owners)?;
            owners.insert(path.clone(), site);

            if self.dry_run {
                log::info!("[dry run] would write {} rows to {}", rows.height(), path.display());
            } else {
                write_csv(&mut rows, &path)?;
                log::info!("Wrote {} rows to {}", rows.height(), path.display());
            }
            written.push(path);
        }
        Ok(written)
    }

    fn unique_site_path(
        &self,
        site: &str,
        rows: &DataFrame,
        owners: &HashMap<PathBuf, String>,
    ) -> ZonalResult<PathBuf> {
        let path = self.site_path(site);
        let Some(owner) = owners.get(&path) else {
            return Ok(path);
        };

        let uid = rows.column("uid")?.i64()?.get(0);
        let renamed = match uid {
            Some(uid) => self.site_path(&format!("{}_uid{}", site, uid)),
            None => path.clone(),
        };
        if owners.contains_key(&renamed) {
            return Err(ZonalError::InvalidData(format!(
                "Sites '{}' and '{}' map to the same output file {}",
                owner,
                site,
                path.display()
            )));
        }
        log::warn!(
            "Sites '{}' and '{}' share the file name {}, writing '{}' to {}",
            owner,
            site,
            path.display(),
            site,
            renamed.display()
        );
        Ok(renamed)
    }
}
