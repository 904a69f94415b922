use crate::config::{CrsZone, ImageErrorPolicy, PipelineConfig};
use crate::core::assemble::assemble;
use crate::core::date_parser::DateToken;
use crate::core::export::SiteExporter;
use crate::core::records::process_image;
use crate::core::table::write_csv;
use crate::core::variables::{lookup, VariableSchema};
use crate::io::image_list::{collection_id_from_list, read_image_list};
use crate::io::vector::PolygonLayer;
use crate::types::{ZonalError, ZonalResult};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Outcome of one collection run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Images that contributed rows, in image list order
    pub processed: Vec<PathBuf>,
    /// Images left out under the skip policy, with the reason
    pub failed: Vec<(PathBuf, String)>,
    /// Per-site CSV files (planned files on a dry run)
    pub files_written: Vec<PathBuf>,
    /// Rows of the assembled time series
    pub rows: usize,
}

/// Zonal statistics of one collection of images over one polygon layer
#[derive(Debug, Clone)]
pub struct ZonalPipeline {
    config: PipelineConfig,
    schema: &'static VariableSchema,
}

impl ZonalPipeline {
    pub fn new(config: PipelineConfig) -> ZonalResult<Self> {
        config.validate()?;
        let schema = lookup(&config.variable)?;
        if config.offset_enabled_for(schema.code) && schema.unit_offset.is_none() {
            return Err(ZonalError::Config(format!(
                "Unit offset enabled for {}, which declares no offset",
                schema.code
            )));
        }
        log::info!("Zonal statistics pipeline for {} ({})", schema.code, schema.description);
        Ok(Self { config, schema })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn schema(&self) -> &'static VariableSchema {
        self.schema
    }

    /// Read the image list and polygon layer from disk, then run.
    ///
    /// With a zone the polygons are reprojected to its CRS first. Without a
    /// configured collection id, one is derived from the list file name.
    pub fn run_from_files(
        &self,
        image_list: &Path,
        polygons: &Path,
        zone: Option<CrsZone>,
    ) -> ZonalResult<RunReport> {
        let images = read_image_list(image_list)?;
        let layer = match zone {
            Some(zone) => {
                log::info!("Reprojecting site polygons to {} (EPSG:{})", zone, zone.epsg());
                PolygonLayer::open_reprojected(polygons, zone.epsg())?
            }
            None => PolygonLayer::open(polygons)?,
        };

        let collection_id = self
            .config
            .collection_id
            .clone()
            .or_else(|| collection_id_from_list(image_list));
        self.run_collection(&images, &layer, collection_id)
    }

    /// Process every image, assemble the time series and export it per site
    pub fn run(&self, images: &[PathBuf], layer: &PolygonLayer) -> ZonalResult<RunReport> {
        self.run_collection(images, layer, self.config.collection_id.clone())
    }

    fn run_collection(
        &self,
        images: &[PathBuf],
        layer: &PolygonLayer,
        collection_id: Option<String>,
    ) -> ZonalResult<RunReport> {
        let start = Instant::now();
        if layer.is_empty() {
            log::warn!("Polygon layer has no features, every image table will be empty");
        }
        if images.is_empty() {
            log::warn!("Image list is empty");
        }
        log::info!("Processing {} images over {} polygons", images.len(), layer.len());

        let (tables, mut report) = self.process_images(images, layer)?;
        let table = assemble(self.schema, tables, &self.config)?;
        report.rows = table.height();

        let exporter = SiteExporter::new(&self.config.output_dir, collection_id, self.schema.code)
            .dry_run(self.config.dry_run);
        report.files_written = exporter.export(&table)?;

        log::info!(
            "Finished {}: {} images processed, {} skipped, {} files in {:.2} seconds",
            self.schema.code,
            report.processed.len(),
            report.failed.len(),
            report.files_written.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(report)
    }

    /// Build the per-image tables, applying the image error policy.
    ///
    /// Sequential runs open images one at a time, so an abort stops before
    /// the next image. Parallel runs process every image first.
    pub fn process_images(
        &self,
        images: &[PathBuf],
        layer: &PolygonLayer,
    ) -> ZonalResult<(Vec<DataFrame>, RunReport)> {
        let no_data = self.config.no_data;
        let schema = self.schema;

        #[cfg(feature = "parallel")]
        {
            if self.config.parallel {
                use rayon::prelude::*;

                log::debug!("Processing images on {} threads", rayon::current_num_threads());
                let results: Vec<_> = images
                    .par_iter()
                    .map(|path| (path.clone(), process_image(path, no_data, schema, layer)))
                    .collect();
                return self.collect_tables(results);
            }
        }

        #[cfg(not(feature = "parallel"))]
        {
            if self.config.parallel {
                log::warn!("Built without the parallel feature, processing images sequentially");
            }
        }

        self.collect_tables(
            images
                .iter()
                .map(|path| (path.clone(), process_image(path, no_data, schema, layer))),
        )
    }

    fn collect_tables<I>(&self, results: I) -> ZonalResult<(Vec<DataFrame>, RunReport)>
    where
        I: IntoIterator<Item = (PathBuf, ZonalResult<DataFrame>)>,
    {
        let mut tables = Vec::new();
        let mut report = RunReport::default();

        for (path, result) in results {
            match result {
                Ok(mut table) => {
                    log::debug!("{}: {} rows", path.display(), table.height());
                    self.write_image_table(&path, &mut table)?;
                    tables.push(table);
                    report.processed.push(path);
                }
                Err(e) => match self.config.on_image_error {
                    ImageErrorPolicy::Skip => {
                        log::warn!("Skipping image: {}", e);
                        report.failed.push((path, e.to_string()));
                    }
                    ImageErrorPolicy::Abort => {
                        log::error!("Aborting run: {}", e);
                        return Err(e);
                    }
                },
            }
        }
        Ok((tables, report))
    }

    /// Optional audit copy of a per-image table as `{code}_{date}.csv`
    fn write_image_table(&self, image: &Path, table: &mut DataFrame) -> ZonalResult<()> {
        let Some(dir) = &self.config.image_table_dir else {
            return Ok(());
        };
        let date = DateToken::from_filename(image);
        let path = dir.join(format!("{}_{}.csv", self.schema.code, date.as_str()));
        if self.config.dry_run {
            log::info!("[dry run] would write image table {}", path.display());
            return Ok(());
        }
        fs::create_dir_all(dir)?;
        write_csv(table, &path)?;
        log::debug!("Wrote image table {}", path.display());
        Ok(())
    }
}
