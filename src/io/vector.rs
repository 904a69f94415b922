use crate::types::{ZonalError, ZonalResult};
use gdal::spatial_ref::{CoordTransform, SpatialRef};
use gdal::vector::{FieldValue, LayerAccess};
use gdal::Dataset;
use geo::{Geometry, MultiPolygon};
use std::path::Path;

/// Attribute holding the site name
pub const SITE_NAME_FIELD: &str = "site_name";

/// A monitoring plot polygon tagged with its run-local identity
#[derive(Debug, Clone, PartialEq)]
pub struct SitePolygon {
    /// 1-based position in the layer, regenerated every run
    pub uid: i64,
    pub site_name: String,
    pub geometry: MultiPolygon<f64>,
}

/// Ordered collection of site polygons in a single CRS
#[derive(Debug, Clone, Default)]
pub struct PolygonLayer {
    sites: Vec<SitePolygon>,
    spatial_ref_wkt: Option<String>,
}

impl PolygonLayer {
    /// Read the first layer of a vector dataset as-is
    pub fn open<P: AsRef<Path>>(path: P) -> ZonalResult<Self> {
        Self::read(path.as_ref(), None)
    }

    /// Read the first layer of a vector dataset and reproject it to `epsg`
    pub fn open_reprojected<P: AsRef<Path>>(path: P, epsg: u32) -> ZonalResult<Self> {
        let target = SpatialRef::from_epsg(epsg)?;
        traditional_axis_order(&target);
        Self::read(path.as_ref(), Some(target))
    }

    /// Build a layer from `(site_name, geometry)` pairs, assigning uids 1..n
    pub fn from_sites(sites: Vec<(String, MultiPolygon<f64>)>) -> Self {
        let sites = sites
            .into_iter()
            .enumerate()
            .map(|(index, (site_name, geometry))| SitePolygon {
                uid: index as i64 + 1,
                site_name,
                geometry,
            })
            .collect();
        Self {
            sites,
            spatial_ref_wkt: None,
        }
    }

    fn read(path: &Path, target: Option<SpatialRef>) -> ZonalResult<Self> {
        log::info!("Reading site polygons from: {}", path.display());

        let dataset = Dataset::open(path)?;
        let mut layer = dataset.layer(0)?;
        let source_srs = layer.spatial_ref();

        let transform = match &target {
            Some(target_srs) => {
                let source_srs = source_srs.as_ref().ok_or_else(|| {
                    ZonalError::Config(format!(
                        "{} has no spatial reference, cannot reproject",
                        path.display()
                    ))
                })?;
                traditional_axis_order(source_srs);
                Some(CoordTransform::new(source_srs, target_srs)?)
            }
            None => None,
        };

        let mut sites = Vec::new();
        for (index, feature) in layer.features().enumerate() {
            let site_name = feature
                .field(SITE_NAME_FIELD)?
                .map(field_to_string)
                .unwrap_or_default();

            let geometry = feature.geometry_by_index(0)?;
            let geometry = match &transform {
                Some(ct) => geometry.transform(ct)?.to_geo()?,
                None => geometry.to_geo()?,
            };

            sites.push(SitePolygon {
                uid: index as i64 + 1,
                site_name,
                geometry: to_multipolygon(geometry, index)?,
            });
        }

        let spatial_ref_wkt = match target.as_ref().or(source_srs.as_ref()) {
            Some(srs) => Some(srs.to_wkt()?),
            None => None,
        };

        log::info!("Loaded {} site polygons", sites.len());
        Ok(Self {
            sites,
            spatial_ref_wkt,
        })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SitePolygon> {
        self.sites.iter()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// WKT of the layer CRS, when known
    pub fn spatial_ref_wkt(&self) -> Option<&str> {
        self.spatial_ref_wkt.as_deref()
    }

    /// Whether the layer CRS matches a raster projection given as WKT.
    ///
    /// Returns `None` when either side is unknown.
    pub fn same_crs_as(&self, raster_wkt: &str) -> Option<bool> {
        let layer_wkt = self.spatial_ref_wkt.as_deref()?;
        if raster_wkt.trim().is_empty() {
            return None;
        }
        let layer_srs = SpatialRef::from_wkt(layer_wkt).ok()?;
        let raster_srs = SpatialRef::from_wkt(raster_wkt).ok()?;
        Some(layer_srs == raster_srs)
    }
}

impl<'a> IntoIterator for &'a PolygonLayer {
    type Item = &'a SitePolygon;
    type IntoIter = std::slice::Iter<'a, SitePolygon>;

    fn into_iter(self) -> Self::IntoIter {
        self.sites.iter()
    }
}

fn traditional_axis_order(srs: &SpatialRef) {
    srs.set_axis_mapping_strategy(
        gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER,
    );
}

fn field_to_string(value: FieldValue) -> String {
    match value {
        FieldValue::StringValue(s) => s,
        FieldValue::IntegerValue(v) => v.to_string(),
        FieldValue::Integer64Value(v) => v.to_string(),
        FieldValue::RealValue(v) => v.to_string(),
        other => format!("{:?}", other),
    }
}

fn to_multipolygon(geometry: Geometry<f64>, index: usize) -> ZonalResult<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(polygon) => Ok(MultiPolygon::new(vec![polygon])),
        Geometry::MultiPolygon(multi) => Ok(multi),
        other => Err(ZonalError::InvalidData(format!(
            "Feature {} is not a polygon: {:?}",
            index, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon};

    #[test]
    fn test_from_sites_assigns_positional_uids() {
        let square = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]]);
        let layer = PolygonLayer::from_sites(vec![
            ("b".to_string(), square.clone()),
            ("a".to_string(), square),
        ]);

        let uids: Vec<_> = layer.iter().map(|s| (s.uid, s.site_name.as_str())).collect();
        assert_eq!(uids, vec![(1, "b"), (2, "a")]);
        assert!(layer.spatial_ref_wkt().is_none());
        assert!(layer.same_crs_as("").is_none());
    }

    #[test]
    fn test_non_polygon_geometry_rejected() {
        let geometry = Geometry::Point(point!(x: 1.0, y: 2.0));
        assert!(matches!(
            to_multipolygon(geometry, 3),
            Err(ZonalError::InvalidData(_))
        ));
    }
}
