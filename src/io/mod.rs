//! I/O modules for reading rasters, site polygons and image lists

pub mod image_list;
pub mod raster;
pub mod vector;

pub use image_list::{read_image_list, write_image_list, ImageCatalog, LandsatTile, TileStatus};
pub use raster::RasterImage;
pub use vector::{PolygonLayer, SitePolygon};
