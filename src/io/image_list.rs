//! Image lists: the newline separated raster paths a run consumes, and the
//! catalog that builds them from a Landsat tile directory.

use crate::config::CrsZone;
use crate::types::{ZonalError, ZonalResult};
use regex::Regex;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Read an image list file, one path per line
pub fn read_image_list<P: AsRef<Path>>(path: P) -> ZonalResult<Vec<PathBuf>> {
    let file = File::open(path.as_ref())?;
    let mut images = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        images.push(PathBuf::from(line));
    }
    log::debug!("{} images listed in {}", images.len(), path.as_ref().display());
    Ok(images)
}

/// Write an image list file, one path per line
pub fn write_image_list<P: AsRef<Path>>(path: P, images: &[PathBuf]) -> ZonalResult<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    for image in images {
        writeln!(writer, "{}", image.display())?;
    }
    writer.flush()?;
    Ok(())
}

/// Tile id of a list file named like `106_069_h99_landsat_tile_list.csv` (`106069`)
pub fn collection_id_from_list<P: AsRef<Path>>(path: P) -> Option<String> {
    let name = path.as_ref().file_name()?.to_string_lossy().into_owned();
    let re = Regex::new(r"^(\d{3})_(\d{3})").ok()?;
    let caps = re.captures(&name)?;
    Some(format!("{}{}", &caps[1], &caps[2]))
}

/// WRS-2 path / row of a Landsat tile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandsatTile {
    pub path: String,
    pub row: String,
}

impl LandsatTile {
    pub fn new(path: &str, row: &str) -> Self {
        Self {
            path: path.to_string(),
            row: row.to_string(),
        }
    }

    /// Directory name of the tile (`106_069`)
    pub fn dir_name(&self) -> String {
        format!("{}_{}", self.path, self.row)
    }

    /// Collection id used in output names (`106069`)
    pub fn collection_id(&self) -> String {
        format!("{}{}", self.path, self.row)
    }
}

/// Outcome of checking a tile against the minimum image count
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileStatus {
    /// Enough images; the list was written to this path
    ForProcessing(PathBuf),
    /// Fewer images than required
    Insufficient { found: usize, required: usize },
}

/// Images of one variable found under a tile directory
#[derive(Debug, Clone)]
pub struct ImageCatalog {
    tile: LandsatTile,
    variable: String,
    images: Vec<PathBuf>,
}

impl ImageCatalog {
    /// Filename suffix of a variable's mosaics for a zone (`h99m2.img`)
    pub fn suffix(variable: &str, zone: CrsZone) -> String {
        format!("{}m{}.img", variable, zone.code())
    }

    /// Walk `<root>/<path>_<row>/<product_dir>` for the variable's images
    pub fn scan(
        root: &Path,
        tile: &LandsatTile,
        product_dir: &str,
        variable: &str,
        zone: CrsZone,
    ) -> ZonalResult<Self> {
        let tile_dir = root.join(tile.dir_name()).join(product_dir);
        if !tile_dir.is_dir() {
            return Err(ZonalError::Config(format!(
                "Tile directory does not exist: {}",
                tile_dir.display()
            )));
        }

        let suffix = Self::suffix(variable, zone);
        log::info!("Searching {} for *{}", tile_dir.display(), suffix);

        let mut images = Vec::new();
        for entry in WalkDir::new(&tile_dir) {
            let entry = entry.map_err(|e| ZonalError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().ends_with(&suffix) {
                images.push(entry.into_path());
            }
        }
        images.sort();

        log::info!("Found {} {} images for tile {}", images.len(), variable, tile.dir_name());
        Ok(Self {
            tile: tile.clone(),
            variable: variable.to_string(),
            images,
        })
    }

    pub fn images(&self) -> &[PathBuf] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn is_sufficient(&self, min_count: usize) -> bool {
        self.images.len() >= min_count
    }

    /// Write the image list and the tile status lists under `status_dir`.
    ///
    /// Layout:
    /// `{var}_for_processing/{path}_{row}_{var}_landsat_tile_list.csv` and
    /// `{var}_tile_status_lists/Complete_list_of_{var}_tiles_*.csv`.
    pub fn write_status(&self, status_dir: &Path, min_count: usize) -> ZonalResult<TileStatus> {
        let var = &self.variable;
        let for_processing = status_dir.join(format!("{}_for_processing", var));
        let status_lists = status_dir.join(format!("{}_tile_status_lists", var));
        fs::create_dir_all(&for_processing)?;
        fs::create_dir_all(&status_lists)?;

        let tile_name = self.tile.dir_name();
        let (ready, not_processed, status) = if self.is_sufficient(min_count) {
            let list_path = for_processing.join(format!("{}_{}_landsat_tile_list.csv", tile_name, var));
            write_image_list(&list_path, &self.images)?;
            (vec![tile_name], vec![], TileStatus::ForProcessing(list_path))
        } else {
            log::warn!(
                "Insufficient {} images for tile {}: {} found, {} required",
                var,
                tile_name,
                self.images.len(),
                min_count
            );
            let status = TileStatus::Insufficient {
                found: self.images.len(),
                required: min_count,
            };
            (vec![], vec![tile_name], status)
        };

        write_lines(
            &status_lists.join(format!("Complete_list_of_{}_tiles_ready_for_zonal_stats.csv", var)),
            &ready,
        )?;
        write_lines(
            &status_lists.join(format!("Complete_list_of_{}_tiles_not_processed.csv", var)),
            &not_processed,
        )?;
        Ok(status)
    }
}

fn write_lines(path: &Path, lines: &[String]) -> ZonalResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}
