//! # Raceline Library
//!
//! Turns lanelet2 maps into inputs for a trajectory follower: lane boundary
//! and centerline CSVs in a local metric frame, and trajectories with heading
//! quaternions and curvature-based target speeds.
//!
//! ## Features
//!
//! - **Boundary extraction**: lanelet relations first, way `subtype` tags as fallback
//! - **Polyline stitching**: unordered, arbitrarily oriented ways joined end to end
//! - **Local frames**: equirectangular or UTM around an explicit or first-node origin
//! - **Speed profiling**: curvature table with entry braking and exit acceleration
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use raceline::{centerline_trajectory, CenterlineOptions, OsmMap};
//!
//! fn main() -> raceline::Result<()> {
//!     let map = OsmMap::from_path("lanelet2_map.osm")?;
//!     let trajectory = centerline_trajectory(&map, &CenterlineOptions::default())?;
//!     raceline::csv_io::write_trajectory("raceline.csv".as_ref(), &trajectory)?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod csv_io;
pub mod extract;
pub mod osm;
pub mod pipeline;
pub mod profile;
pub mod projection;
pub mod stitch;
pub mod trajectory;

pub use extract::{extract_lane_bounds, LaneBounds, Role, Strategy};
pub use osm::OsmMap;
pub use pipeline::{centerline_trajectory, export_bounds, BoundsExport, CenterlineOptions};
pub use profile::{apply_profile, speed_profile, ProfileConfig};
pub use projection::{GeoPoint, OriginPolicy, ProjectionKind, Projector};
pub use raceline_common::{Error, Result};
pub use stitch::stitch;
pub use trajectory::TrajectoryPoint;
