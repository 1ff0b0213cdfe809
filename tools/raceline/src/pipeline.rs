//! End-to-end runs behind the CLI subcommands
//!
//! Each function reads its inputs, runs the library stages and writes one or
//! more CSV files atomically.

use crate::csv_io::{read_boundary_xy, read_trajectory, write_boundary_csv, write_trajectory};
use crate::extract::{extract_lane_bounds, role_way_ids, LaneBounds, Role, RoleEntry, Strategy};
use crate::osm::{Node, OsmMap};
use crate::profile::{apply_profile, speed_profile, ProfileConfig};
use crate::projection::{OriginPolicy, ProjectionKind, Projector};
use crate::stitch::stitch;
use crate::trajectory::{build_trajectory, constant_speed_trajectory, kmh_to_mps, midline, TrajectoryPoint};
use log::{debug, info, warn};
use raceline_common::{Error, Result};
use std::path::{Path, PathBuf};

pub const DEFAULT_BOUNDS_DIR: &str = "extracted_bounds";
pub const DEFAULT_SPEED_KMH: f64 = 25.0;

/// Where and how to write extracted bounds
#[derive(Debug, Clone)]
pub struct BoundsExport {
    /// Directory for `left.csv`, `right.csv` and `centerline.csv`
    pub outdir: Option<PathBuf>,
    /// Single file holding every role
    pub single_csv: Option<PathBuf>,
    pub origin: OriginPolicy,
    pub projection: ProjectionKind,
}

impl Default for BoundsExport {
    fn default() -> Self {
        Self {
            outdir: None,
            single_csv: None,
            origin: OriginPolicy::FirstNode,
            projection: ProjectionKind::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoundsReport {
    pub strategy: Strategy,
    pub left: usize,
    pub right: usize,
    pub centerline: usize,
    pub files: Vec<PathBuf>,
}

fn role_slices(bounds: &LaneBounds) -> impl Iterator<Item = (Role, &[RoleEntry])> + '_ {
    Role::ALL.into_iter().map(move |role| (role, bounds.role(role)))
}

/// Extract lane bounds from an already parsed map and write them out.
pub fn export_bounds(map: &OsmMap, export: &BoundsExport) -> Result<BoundsReport> {
    let bounds = extract_lane_bounds(map);
    if bounds.is_empty() {
        return Err(Error::insufficient(
            "lane bounds (no left, right or centerline points found)",
            1,
            0,
        ));
    }

    let projector = Projector::new(export.origin.resolve(map)?, export.projection);
    debug!(
        "Projecting with {:?} around ({:.10}, {:.10})",
        projector.kind(),
        projector.origin().lat,
        projector.origin().lon
    );

    let outdir = match (&export.outdir, &export.single_csv) {
        (None, None) => Some(PathBuf::from(DEFAULT_BOUNDS_DIR)),
        (dir, _) => dir.clone(),
    };

    let mut files = Vec::new();
    if let Some(dir) = outdir {
        for (role, entries) in role_slices(&bounds) {
            let path = dir.join(format!("{role}.csv"));
            let rows = write_boundary_csv(&path, [(role, entries)], &projector)?;
            info!("Wrote {rows} {role} rows to {}", path.display());
            files.push(path);
        }
    }
    if let Some(path) = &export.single_csv {
        let rows = write_boundary_csv(path, role_slices(&bounds), &projector)?;
        info!("Wrote {rows} rows to {}", path.display());
        files.push(path.clone());
    }

    Ok(BoundsReport {
        strategy: bounds.strategy,
        left: bounds.left.len(),
        right: bounds.right.len(),
        centerline: bounds.centerline.len(),
        files,
    })
}

/// Options for turning one boundary role into a trajectory
#[derive(Debug, Clone)]
pub struct CenterlineOptions {
    pub role: Role,
    pub speed_kmh: f64,
    pub z: f64,
    /// Curvature-based speeds instead of a constant speed
    pub profile: Option<ProfileConfig>,
    /// Use node `local_x`/`local_y` when every node carries both
    pub prefer_local: bool,
    /// Fail instead of warning when the role's ways do not connect
    pub strict: bool,
    pub origin: OriginPolicy,
    pub projection: ProjectionKind,
}

impl Default for CenterlineOptions {
    fn default() -> Self {
        Self {
            role: Role::Centerline,
            speed_kmh: DEFAULT_SPEED_KMH,
            z: 0.0,
            profile: None,
            prefer_local: true,
            strict: false,
            origin: OriginPolicy::FirstNode,
            projection: ProjectionKind::default(),
        }
    }
}

/// Stitch the ways of one role and build a trajectory along them.
pub fn centerline_trajectory(map: &OsmMap, options: &CenterlineOptions) -> Result<Vec<TrajectoryPoint>> {
    let role = options.role;
    let (strategy, way_ids) = role_way_ids(map, role);
    debug!("{} {role} way(s) selected by {strategy}", way_ids.len());

    let ways: Vec<_> = way_ids
        .iter()
        .filter_map(|id| {
            let way = map.way(id);
            if way.is_none() {
                debug!("Way {id} referenced but not in map, skipping");
            }
            way
        })
        .collect();
    let sequences: Vec<Vec<String>> = ways.iter().map(|w| w.node_ids.clone()).collect();

    let stitched = stitch(&sequences)?;
    if !stitched.is_contiguous() {
        let joins = stitched.forced_joins.len();
        if options.strict {
            return Err(Error::Discontinuous {
                role: role.to_string(),
                joins,
            });
        }
        for join in &stitched.forced_joins {
            warn!(
                "{role} is not contiguous: way {} appended with a jump at point {}",
                ways[join.sequence].id,
                join.position
            );
        }
    }

    let nodes: Vec<&Node> = stitched
        .node_ids
        .iter()
        .filter_map(|id| {
            let node = map.node(id);
            if node.is_none() {
                debug!("Node {id} referenced but not in map, skipping");
            }
            node
        })
        .collect();

    let points = resolve_frame(map, &nodes, options)?;

    if points.len() < 2 {
        return Err(Error::insufficient(format!("{role} trajectory points"), 2, points.len()));
    }

    let speeds = match &options.profile {
        Some(config) => speed_profile(&points, config).speeds,
        None => vec![kmh_to_mps(options.speed_kmh); points.len()],
    };
    build_trajectory(&points, options.z, &speeds)
}

/// Planar coordinates for one polyline, all in a single frame: node
/// `local_x`/`local_y` when preferred and present on every node, projected
/// lat/lon otherwise.
fn resolve_frame(map: &OsmMap, nodes: &[&Node], options: &CenterlineOptions) -> Result<Vec<(f64, f64)>> {
    let local: Option<Vec<(f64, f64)>> = if options.prefer_local {
        nodes.iter().map(|n| n.local_x.zip(n.local_y)).collect()
    } else {
        None
    };
    if let Some(points) = local {
        return Ok(points);
    }

    if options.prefer_local && nodes.iter().any(|n| n.local_x.is_some() || n.local_y.is_some()) {
        warn!("Not every node has local_x/local_y; projecting all nodes from lat/lon");
    }
    let projector = Projector::new(options.origin.resolve(map)?, options.projection);
    Ok(nodes.iter().map(|n| projector.project(n.lat, n.lon)).collect())
}

/// Parse `osm`, build the role trajectory and write it to `output`.
pub fn write_centerline(osm: &Path, output: &Path, options: &CenterlineOptions) -> Result<usize> {
    let map = OsmMap::from_path(osm)?;
    let trajectory = centerline_trajectory(&map, options)?;
    write_trajectory(output, &trajectory)?;
    info!("Wrote {} trajectory points to {}", trajectory.len(), output.display());
    Ok(trajectory.len())
}

/// Replace the speeds of an existing trajectory with a curvature profile.
pub fn profile_file(input: &Path, output: &Path, config: &ProfileConfig) -> Result<usize> {
    let mut trajectory = read_trajectory(input)?;
    apply_profile(&mut trajectory, config);
    write_trajectory(output, &trajectory)?;
    info!("Wrote {} profiled points to {}", trajectory.len(), output.display());
    Ok(trajectory.len())
}

/// Constant-speed trajectory through the midpoints of `left.csv` and
/// `right.csv` in `bounds_dir`.
pub fn midline_from_dir(bounds_dir: &Path, output: &Path, speed_kmh: f64) -> Result<usize> {
    let left = read_boundary_xy(&bounds_dir.join("left.csv"), true)?;
    let right = read_boundary_xy(&bounds_dir.join("right.csv"), true)?;
    if left.len() != right.len() {
        warn!(
            "left has {} points and right has {}; using the first {}",
            left.len(),
            right.len(),
            left.len().min(right.len())
        );
    }
    let mid = midline(&left, &right);
    let trajectory = constant_speed_trajectory(&mid, 0.0, kmh_to_mps(speed_kmh))?;
    write_trajectory(output, &trajectory)?;
    info!("Wrote {} midline points to {}", trajectory.len(), output.display());
    Ok(trajectory.len())
}
