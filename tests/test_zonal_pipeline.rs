use approx::assert_relative_eq;
use gdal::raster::Buffer;
use gdal::DriverManager;
use plotstats::config::{ImageErrorPolicy, PipelineConfig};
use plotstats::core::pipeline::ZonalPipeline;
use plotstats::io::image_list::write_image_list;
use plotstats::io::vector::PolygonLayer;
use plotstats::types::ZonalError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const NO_DATA: f64 = -9999.0;

// 3x3 grid of unit pixels covering x 0..3, y 0..3
const GEO_TRANSFORM: [f64; 6] = [0.0, 1.0, 0.0, 3.0, 0.0, -1.0];

fn write_raster(path: &Path, bands: &[Vec<f64>]) {
    let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
    let mut dataset = driver
        .create_with_band_type::<f64, _>(path, 3, 3, bands.len() as isize)
        .unwrap();
    dataset.set_geo_transform(&GEO_TRANSFORM).unwrap();
    for (index, data) in bands.iter().enumerate() {
        let mut band = dataset.rasterband(index as isize + 1).unwrap();
        band.write((0, 0), (3, 3), &Buffer::new((3, 3), data.clone()))
            .unwrap();
    }
}

fn write_sites(path: &Path, sites: &[(&str, [f64; 4])]) {
    let features: Vec<String> = sites
        .iter()
        .map(|(name, [x0, y0, x1, y1])| {
            format!(
                r#"{{"type": "Feature", "properties": {{"site_name": "{name}"}}, "geometry": {{"type": "Polygon", "coordinates": [[[{x0}, {y0}], [{x1}, {y0}], [{x1}, {y1}], [{x0}, {y1}], [{x0}, {y0}]]]}}}}"#
            )
        })
        .collect();
    let collection = format!(
        r#"{{"type": "FeatureCollection", "features": [{}]}}"#,
        features.join(", ")
    );
    fs::write(path, collection).unwrap();
}

fn read_csv(path: &Path) -> Vec<HashMap<String, String>> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().clone();
    reader
        .records()
        .map(|record| {
            let record = record.unwrap();
            headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect()
        })
        .collect()
}

fn number(row: &HashMap<String, String>, column: &str) -> f64 {
    row[column].parse().unwrap()
}

struct Fixture {
    dir: tempfile::TempDir,
    images: Vec<PathBuf>,
}

impl Fixture {
    /// Three annual h99 rasters with values `offset + 1..=9`, one no-data pixel in 2019
    fn annual_h99() -> Self {
        Self::annual(true)
    }

    /// Three annual h99 rasters with values `offset + 1..=9` and no gaps
    fn annual_h99_complete() -> Self {
        Self::annual(false)
    }

    fn annual(gap_in_2019: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut images = Vec::new();
        for (year, offset) in [("2018", 0.0), ("2019", 10.0), ("2020", 20.0)] {
            let mut data: Vec<f64> = (1..=9).map(|v| v as f64 + offset).collect();
            if gap_in_2019 && year == "2019" {
                data[4] = NO_DATA;
            }
            let path = dir.path().join(format!("lztmre_nt_{}_h99a2.tif", year));
            write_raster(&path, &[data]);
            images.push(path);
        }
        Self { dir, images }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn output_dir(&self) -> PathBuf {
        let out = self.path("out");
        fs::create_dir_all(&out).unwrap();
        out
    }
}

#[test]
fn test_end_to_end_single_polygon() {
    let fixture = Fixture::annual_h99();
    let sites = fixture.path("sites.geojson");
    write_sites(&sites, &[("alpha", [0.0, 0.0, 3.0, 3.0])]);

    let mut config = PipelineConfig::new("h99", NO_DATA, fixture.output_dir());
    config.collection_id = Some("106069".to_string());
    let pipeline = ZonalPipeline::new(config).unwrap();
    let layer = PolygonLayer::open(&sites).unwrap();

    let report = pipeline.run(&fixture.images, &layer).unwrap();
    assert_eq!(report.processed.len(), 3);
    assert!(report.failed.is_empty());
    assert_eq!(report.rows, 3);
    assert_eq!(report.files_written.len(), 1);

    let output = fixture.path("out").join("alpha_106069_h99_zonal_stats.csv");
    assert_eq!(report.files_written[0], output);

    let rows = read_csv(&output);
    assert_eq!(rows.len(), 3);

    assert_eq!(rows[0]["uid"], "1");
    assert_eq!(rows[0]["site"], "alpha");
    assert_eq!(rows[0]["date"], "2018");
    assert_eq!(rows[0]["start_date"], "20180101");
    assert_eq!(rows[0]["end_date"], "20181231");
    assert_eq!(rows[0]["image"], "lztmre_nt_2018_h99a2.tif");
    assert_relative_eq!(number(&rows[0], "b1_h99_mean"), 5.0);
    assert_relative_eq!(number(&rows[0], "b1_h99_count"), 9.0);
    assert_relative_eq!(number(&rows[0], "b1_h99_med"), 5.0);

    // centre pixel of 2019 is no-data
    let expected: f64 = [11.0, 12.0, 13.0, 14.0, 16.0, 17.0, 18.0, 19.0].iter().sum::<f64>() / 8.0;
    assert_eq!(rows[1]["date"], "2019");
    assert_relative_eq!(number(&rows[1], "b1_h99_mean"), expected);
    assert_relative_eq!(number(&rows[1], "b1_h99_count"), 8.0);

    assert_eq!(rows[2]["start_year"], "2020");
    assert_relative_eq!(number(&rows[2], "b1_h99_min"), 21.0);
    assert_relative_eq!(number(&rows[2], "b1_h99_max"), 29.0);

    for row in &rows {
        let (min, max) = (number(row, "b1_h99_min"), number(row, "b1_h99_max"));
        let mean = number(row, "b1_h99_mean");
        assert!(min <= mean && mean <= max);
    }
}

#[test]
fn test_three_images_without_gaps() {
    let fixture = Fixture::annual_h99_complete();
    let sites = fixture.path("sites.geojson");
    write_sites(&sites, &[("alpha", [0.0, 0.0, 3.0, 3.0])]);

    let pipeline = ZonalPipeline::new(PipelineConfig::new("h99", NO_DATA, fixture.output_dir())).unwrap();
    let report = pipeline
        .run(&fixture.images, &PolygonLayer::open(&sites).unwrap())
        .unwrap();
    assert_eq!(report.rows, 3);

    let rows = read_csv(&fixture.path("out").join("alpha_h99_zonal_stats.csv"));
    assert_eq!(rows.len(), 3);
    for (row, (year, offset)) in rows.iter().zip([("2018", 0.0), ("2019", 10.0), ("2020", 20.0)]) {
        let values: Vec<f64> = (1..=9).map(|v| v as f64 + offset).collect();
        let expected = values.iter().sum::<f64>() / values.len() as f64;

        assert_eq!(row["start_year"], year);
        assert_relative_eq!(number(row, "b1_h99_mean"), expected);
        assert_relative_eq!(number(row, "b1_h99_count"), 9.0);
        assert_relative_eq!(number(row, "b1_h99_min"), offset + 1.0);
        assert_relative_eq!(number(row, "b1_h99_max"), offset + 9.0);
    }

    // statistics stay floating point in the file
    assert_eq!(rows[0]["b1_h99_mean"], "5.0");
    assert_eq!(rows[1]["b1_h99_count"], "9.0");
    assert_eq!(rows[2]["uid"], "1");
}

#[test]
fn test_sites_sharing_a_file_name_are_both_written() {
    let fixture = Fixture::annual_h99_complete();
    let sites = fixture.path("sites.geojson");
    write_sites(
        &sites,
        &[("north/a", [0.0, 2.0, 3.0, 3.0]), ("north_a", [0.0, 0.0, 3.0, 1.0])],
    );

    let pipeline = ZonalPipeline::new(PipelineConfig::new("h99", NO_DATA, fixture.output_dir())).unwrap();
    let report = pipeline
        .run(&fixture.images, &PolygonLayer::open(&sites).unwrap())
        .unwrap();
    assert_eq!(
        report.files_written,
        vec![
            fixture.path("out").join("north_a_h99_zonal_stats.csv"),
            fixture.path("out").join("north_a_uid2_h99_zonal_stats.csv"),
        ]
    );

    let first = read_csv(&report.files_written[0]);
    let second = read_csv(&report.files_written[1]);
    assert_eq!(first.len(), 3);
    assert_eq!(second.len(), 3);
    assert!(first.iter().all(|row| row["site"] == "north/a"));
    assert!(second.iter().all(|row| row["site"] == "north_a"));
    assert_relative_eq!(number(&first[0], "b1_h99_mean"), 2.0);
    assert_relative_eq!(number(&second[0], "b1_h99_mean"), 8.0);
}

#[test]
fn test_rows_per_site_match_images_processed() {
    let fixture = Fixture::annual_h99();
    let sites = fixture.path("sites.geojson");
    write_sites(
        &sites,
        &[
            ("north", [0.0, 2.0, 3.0, 3.0]),
            ("south", [0.0, 0.0, 3.0, 1.0]),
            ("nowhere", [50.0, 50.0, 51.0, 51.0]),
        ],
    );

    let pipeline = ZonalPipeline::new(PipelineConfig::new("h99", NO_DATA, fixture.output_dir())).unwrap();
    let report = pipeline
        .run(&fixture.images, &PolygonLayer::open(&sites).unwrap())
        .unwrap();
    assert_eq!(report.rows, 9);
    assert_eq!(report.files_written.len(), 3);

    for site in ["north", "south", "nowhere"] {
        let rows = read_csv(&fixture.path("out").join(format!("{}_h99_zonal_stats.csv", site)));
        assert_eq!(rows.len(), report.processed.len());
    }

    let north = read_csv(&fixture.path("out").join("north_h99_zonal_stats.csv"));
    assert_relative_eq!(number(&north[0], "b1_h99_mean"), 2.0);

    // a polygon off the grid has missing statistics, not zeros
    let nowhere = read_csv(&fixture.path("out").join("nowhere_h99_zonal_stats.csv"));
    assert_eq!(nowhere[0]["uid"], "3");
    assert_eq!(nowhere[0]["b1_h99_count"], "");
    assert_eq!(nowhere[0]["b1_h99_mean"], "");
}

#[test]
fn test_unreadable_image_is_skipped_by_default() {
    let fixture = Fixture::annual_h99();
    let sites = fixture.path("sites.geojson");
    write_sites(&sites, &[("alpha", [0.0, 0.0, 3.0, 3.0])]);

    let mut images = fixture.images.clone();
    images.insert(1, fixture.path("lztmre_nt_2021_h99a2.tif"));

    let pipeline = ZonalPipeline::new(PipelineConfig::new("h99", NO_DATA, fixture.output_dir())).unwrap();
    let report = pipeline
        .run(&images, &PolygonLayer::open(&sites).unwrap())
        .unwrap();

    assert_eq!(report.processed.len(), 3);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, images[1]);
    assert_eq!(report.rows, 3);
}

#[test]
fn test_abort_policy_stops_at_failing_image() {
    let fixture = Fixture::annual_h99();
    let sites = fixture.path("sites.geojson");
    write_sites(&sites, &[("alpha", [0.0, 0.0, 3.0, 3.0])]);

    let missing = fixture.path("lztmre_nt_2021_h99a2.tif");
    let mut images = fixture.images.clone();
    images.push(missing.clone());

    let mut config = PipelineConfig::new("h99", NO_DATA, fixture.output_dir());
    config.on_image_error = ImageErrorPolicy::Abort;
    let pipeline = ZonalPipeline::new(config).unwrap();

    match pipeline.run(&images, &PolygonLayer::open(&sites).unwrap()) {
        Err(ZonalError::Image { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected an image error, got {:?}", other),
    }
    assert!(fs::read_dir(fixture.path("out")).unwrap().next().is_none());
}

#[test]
fn test_abort_on_first_image_writes_no_image_tables() {
    let fixture = Fixture::annual_h99_complete();
    let sites = fixture.path("sites.geojson");
    write_sites(&sites, &[("alpha", [0.0, 0.0, 3.0, 3.0])]);

    let missing = fixture.path("lztmre_nt_2017_h99a2.tif");
    let mut images = vec![missing.clone()];
    images.extend(fixture.images.iter().cloned());

    let mut config = PipelineConfig::new("h99", NO_DATA, fixture.output_dir());
    config.on_image_error = ImageErrorPolicy::Abort;
    config.image_table_dir = Some(fixture.path("tables"));
    let pipeline = ZonalPipeline::new(config).unwrap();

    match pipeline.run(&images, &PolygonLayer::open(&sites).unwrap()) {
        Err(ZonalError::Image { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected an image error, got {:?}", other),
    }
    assert!(!fixture.path("tables").exists());
}

#[test]
fn test_missing_output_directory_is_reported() {
    let fixture = Fixture::annual_h99();
    let sites = fixture.path("sites.geojson");
    write_sites(&sites, &[("alpha", [0.0, 0.0, 3.0, 3.0])]);

    let pipeline = ZonalPipeline::new(PipelineConfig::new("h99", NO_DATA, fixture.path("absent"))).unwrap();
    let result = pipeline.run(&fixture.images, &PolygonLayer::open(&sites).unwrap());
    assert!(matches!(result, Err(ZonalError::MissingOutputDir(_))));
}

#[test]
fn test_run_from_files_derives_collection_id() {
    let fixture = Fixture::annual_h99();
    let sites = fixture.path("sites.geojson");
    write_sites(&sites, &[("alpha", [0.0, 0.0, 3.0, 3.0])]);

    let list = fixture.path("106_069_h99_landsat_tile_list.csv");
    write_image_list(&list, &fixture.images).unwrap();

    let mut config = PipelineConfig::new("h99", NO_DATA, fixture.output_dir());
    config.image_table_dir = Some(fixture.path("tables"));
    let pipeline = ZonalPipeline::new(config).unwrap();
    let report = pipeline.run_from_files(&list, &sites, None).unwrap();

    assert_eq!(
        report.files_written,
        vec![fixture.path("out").join("alpha_106069_h99_zonal_stats.csv")]
    );
    for year in ["2018", "2019", "2020"] {
        let table = fixture.path("tables").join(format!("h99_{}.csv", year));
        assert_eq!(read_csv(&table).len(), 1);
    }
}

#[test]
fn test_dry_run_touches_nothing() {
    let fixture = Fixture::annual_h99();
    let sites = fixture.path("sites.geojson");
    write_sites(&sites, &[("alpha", [0.0, 0.0, 3.0, 3.0])]);

    let mut config = PipelineConfig::new("h99", NO_DATA, fixture.path("planned"));
    config.dry_run = true;
    config.image_table_dir = Some(fixture.path("tables"));
    let report = ZonalPipeline::new(config)
        .unwrap()
        .run(&fixture.images, &PolygonLayer::open(&sites).unwrap())
        .unwrap();

    assert_eq!(report.files_written.len(), 1);
    assert!(!fixture.path("planned").exists());
    assert!(!fixture.path("tables").exists());
}

#[test]
fn test_fractional_cover_offset_across_bands() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("lztmre_nt_m201912202002_dila2.tif");
    let bands: Vec<Vec<f64>> = [110.0, 150.0, 140.0]
        .iter()
        .map(|&v| vec![v; 9])
        .collect();
    write_raster(&image, &bands);

    let sites = dir.path().join("sites.geojson");
    write_sites(&sites, &[("alpha", [0.5, 0.5, 2.5, 2.5])]);
    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();

    let mut config = PipelineConfig::new("dil", 0.0, &out);
    config.offset_enabled.insert("dil".to_string());
    let report = ZonalPipeline::new(config)
        .unwrap()
        .run(&[image], &PolygonLayer::open(&sites).unwrap())
        .unwrap();
    assert_eq!(report.rows, 1);

    let rows = read_csv(&out.join("alpha_dil_zonal_stats.csv"));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["date"], "201912202002");
    assert_eq!(rows[0]["start_date"], "20191201");
    assert_eq!(rows[0]["end_date"], "20200229");
    assert_relative_eq!(number(&rows[0], "b1_dil_mean"), 10.0);
    assert_relative_eq!(number(&rows[0], "b2_dil_med"), 50.0);
    assert_relative_eq!(number(&rows[0], "b3_dil_max"), 40.0);
    // counts and spreads are not shifted
    assert_relative_eq!(number(&rows[0], "b2_dil_count"), 9.0);
    assert_relative_eq!(number(&rows[0], "b2_dil_std"), 0.0);
}

#[test]
fn test_categorical_long_layout() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("lztmre_nt_m201901201912_dkaa2.tif");
    let months = vec![3.0, 3.0, 5.0, 0.0, 3.0, 5.0, 1.0, 0.0, 0.0];
    write_raster(&image, &[months]);

    let sites = dir.path().join("sites.geojson");
    write_sites(&sites, &[("alpha", [0.0, 0.0, 3.0, 3.0])]);
    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();

    let report = ZonalPipeline::new(PipelineConfig::new("dka", 0.0, &out))
        .unwrap()
        .run(&[image], &PolygonLayer::open(&sites).unwrap())
        .unwrap();
    assert_eq!(report.rows, 1);

    let rows = read_csv(&out.join("alpha_dka_zonal_stats.csv"));
    let row = &rows[0];
    assert_eq!(row["band"], "1");
    assert_relative_eq!(number(row, "count"), 6.0);
    assert_relative_eq!(number(row, "majority"), 3.0);
    assert_relative_eq!(number(row, "minority"), 1.0);
    assert_relative_eq!(number(row, "mar"), 0.5);
    assert_relative_eq!(number(row, "jan"), 1.0 / 6.0, epsilon = 1e-12);
    assert_relative_eq!(number(row, "dec"), 0.0);
}
