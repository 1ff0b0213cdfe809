//! Boundary and trajectory CSV files
//!
//! Boundary files carry one row per extracted point:
//! `lanelet_or_way_id,role,index,latitude,longitude,x,y,local_x,local_y`.
//! Trajectory files carry `x,y,z,x_quat,y_quat,z_quat,w_quat,speed`.
//!
//! Every writer goes through [`write_atomic`], so a failed run never leaves a
//! half-written file where a previous output used to be.

use crate::extract::{Role, RoleEntry};
use crate::projection::{equirectangular, GeoPoint, Projector};
use crate::trajectory::{headings, TrajectoryPoint};
use csv::{ReaderBuilder, StringRecord, Writer, WriterBuilder};
use raceline_common::{suggest_column, Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

pub const BOUNDARY_HEADER: [&str; 9] = [
    "lanelet_or_way_id",
    "role",
    "index",
    "latitude",
    "longitude",
    "x",
    "y",
    "local_x",
    "local_y",
];

pub const TRAJECTORY_HEADER: [&str; 8] = [
    "x", "y", "z", "x_quat", "y_quat", "z_quat", "w_quat", "speed",
];

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!(".{name}.tmp-{}", std::process::id()))
}

/// Write a CSV through a sibling temp file, renamed over `path` on success.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut Writer<File>) -> Result<()>,
{
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| Error::file(dir, e))?;
    }
    let tmp = temp_path_for(path);

    let result = (|| {
        let file = File::create(&tmp).map_err(|e| Error::file(&tmp, e))?;
        // Headers are written explicitly by each caller
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        write(&mut writer)?;
        writer.flush().map_err(|e| Error::file(&tmp, e))?;
        drop(writer);
        std::fs::rename(&tmp, path).map_err(|e| Error::file(path, e))
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

/// Formatted boundary row; `x`/`y` come from `projector`.
pub fn boundary_record(role: Role, entry: &RoleEntry, projector: &Projector) -> [String; 9] {
    let p = &entry.point;
    let (x, y) = projector.project(p.lat, p.lon);
    let local = |v: Option<f64>| v.map(|v| format!("{v:.4}")).unwrap_or_default();
    [
        entry.source_id.clone(),
        role.as_str().to_string(),
        entry.index.to_string(),
        format!("{:.10}", p.lat),
        format!("{:.10}", p.lon),
        format!("{x:.4}"),
        format!("{y:.4}"),
        local(p.local_x),
        local(p.local_y),
    ]
}

/// Write boundary rows for several roles into one file. Returns the row count.
pub fn write_boundary_csv<'a, I>(path: &Path, rows: I, projector: &Projector) -> Result<usize>
where
    I: IntoIterator<Item = (Role, &'a [RoleEntry])>,
{
    let mut count = 0;
    write_atomic(path, |w| {
        w.write_record(BOUNDARY_HEADER)?;
        for (role, entries) in rows {
            for entry in entries {
                w.write_record(boundary_record(role, entry, projector))?;
                count += 1;
            }
        }
        Ok(())
    })?;
    Ok(count)
}

struct Header {
    names: Vec<String>,
}

impl Header {
    fn new(record: &StringRecord) -> Self {
        Self {
            names: record.iter().map(|h| h.trim().to_string()).collect(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|h| h == name)
    }

    fn has_all(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.position(n).is_some())
    }

    fn schema_error(&self, file: &Path, wanted: &[&str]) -> Error {
        let missing: Vec<String> = wanted
            .iter()
            .filter(|n| self.position(n).is_none())
            .map(|n| n.to_string())
            .collect();
        let suggestion = missing
            .iter()
            .find_map(|m| suggest_column(m, &self.names));
        Error::SchemaError {
            file: file.to_path_buf(),
            missing,
            found: self.names.clone(),
            suggestion,
        }
    }
}

fn read_table(path: &Path) -> Result<(Header, Vec<StringRecord>)> {
    let file = File::open(path).map_err(|e| Error::file(path, e))?;
    let mut reader = ReaderBuilder::new()
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(file);
    let header = Header::new(reader.headers()?);
    let records = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((header, records))
}

fn cell(record: &StringRecord, col: usize) -> Option<&str> {
    record.get(col).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_cell(path: &Path, row: usize, name: &str, text: &str) -> Result<f64> {
    text.parse::<f64>().map_err(|_| {
        Error::InvalidInput(format!(
            "{}: row {row}: invalid number '{text}' in column '{name}'",
            path.display()
        ))
    })
}

fn required(path: &Path, record: &StringRecord, row: usize, name: &str, col: usize) -> Result<f64> {
    let text = cell(record, col).ok_or_else(|| {
        Error::InvalidInput(format!(
            "{}: row {row}: empty value in column '{name}'",
            path.display()
        ))
    })?;
    parse_cell(path, row, name, text)
}

fn optional(path: &Path, record: &StringRecord, row: usize, name: &str, col: Option<usize>) -> Result<Option<f64>> {
    match col.and_then(|c| cell(record, c)) {
        Some(text) => parse_cell(path, row, name, text).map(Some),
        None => Ok(None),
    }
}

fn read_pair(path: &Path, header: &Header, records: &[StringRecord], a: &str, b: &str) -> Result<Vec<(f64, f64)>> {
    let (ca, cb) = match (header.position(a), header.position(b)) {
        (Some(ca), Some(cb)) => (ca, cb),
        _ => return Err(header.schema_error(path, &[a, b])),
    };
    records
        .iter()
        .enumerate()
        .map(|(i, r)| Ok((required(path, r, i + 1, a, ca)?, required(path, r, i + 1, b, cb)?)))
        .collect()
}

/// Read planar points from a boundary-style CSV.
///
/// Preference: `local_x,local_y` (when `prefer_local` and every row has
/// them), then `x,y`, then `latitude,longitude` projected equirectangularly
/// around the first row.
pub fn read_boundary_xy(path: &Path, prefer_local: bool) -> Result<Vec<(f64, f64)>> {
    let (header, records) = read_table(path)?;

    if prefer_local && header.has_all(&["local_x", "local_y"]) {
        let (cx, cy) = (header.position("local_x"), header.position("local_y"));
        let complete = records
            .iter()
            .all(|r| cx.and_then(|c| cell(r, c)).is_some() && cy.and_then(|c| cell(r, c)).is_some());
        if complete {
            return read_pair(path, &header, &records, "local_x", "local_y");
        }
    }

    if header.has_all(&["x", "y"]) {
        return read_pair(path, &header, &records, "x", "y");
    }

    if header.has_all(&["latitude", "longitude"]) {
        let latlon = read_pair(path, &header, &records, "latitude", "longitude")?;
        let Some(&(lat0, lon0)) = latlon.first() else {
            return Ok(Vec::new());
        };
        let origin = GeoPoint::new(lat0, lon0);
        return Ok(latlon
            .into_iter()
            .map(|(lat, lon)| equirectangular(lat, lon, origin))
            .collect());
    }

    Err(header.schema_error(path, &["x", "y"]))
}

#[derive(Debug, Serialize, Deserialize)]
struct TrajectoryRecord {
    x: f64,
    y: f64,
    z: f64,
    x_quat: f64,
    y_quat: f64,
    z_quat: f64,
    w_quat: f64,
    speed: f64,
}

impl From<&TrajectoryPoint> for TrajectoryRecord {
    fn from(p: &TrajectoryPoint) -> Self {
        Self {
            x: p.x,
            y: p.y,
            z: p.z,
            x_quat: p.x_quat,
            y_quat: p.y_quat,
            z_quat: p.z_quat,
            w_quat: p.w_quat,
            speed: p.speed,
        }
    }
}

pub fn write_trajectory(path: &Path, points: &[TrajectoryPoint]) -> Result<()> {
    write_atomic(path, |w| {
        w.write_record(TRAJECTORY_HEADER)?;
        for p in points {
            w.serialize(TrajectoryRecord::from(p))?;
        }
        Ok(())
    })
}

/// Read a trajectory CSV.
///
/// Only `x` and `y` are required. A missing `z` or `speed` reads as 0; when
/// any quaternion column is missing the orientation is rebuilt from the path
/// heading.
pub fn read_trajectory(path: &Path) -> Result<Vec<TrajectoryPoint>> {
    let (header, records) = read_table(path)?;
    if !header.has_all(&["x", "y"]) {
        return Err(header.schema_error(path, &["x", "y"]));
    }
    let col = |name: &str| header.position(name);
    let quat_cols = ["x_quat", "y_quat", "z_quat", "w_quat"];
    let has_quat = header.has_all(&quat_cols);

    let mut points = Vec::with_capacity(records.len());
    for (i, r) in records.iter().enumerate() {
        let row = i + 1;
        let opt = |name: &str| optional(path, r, row, name, col(name));
        let x = required(path, r, row, "x", col("x").unwrap_or_default())?;
        let y = required(path, r, row, "y", col("y").unwrap_or_default())?;
        let z = opt("z")?.unwrap_or(0.0);
        let speed = opt("speed")?.unwrap_or(0.0);
        let mut point = TrajectoryPoint::new(x, y, z, 0.0, speed);
        if has_quat {
            point.x_quat = opt("x_quat")?.unwrap_or(0.0);
            point.y_quat = opt("y_quat")?.unwrap_or(0.0);
            point.z_quat = opt("z_quat")?.unwrap_or(0.0);
            point.w_quat = opt("w_quat")?.unwrap_or(1.0);
        }
        points.push(point);
    }

    if !has_quat && points.len() >= 2 {
        let xy: Vec<_> = points.iter().map(TrajectoryPoint::xy).collect();
        for (p, yaw) in points.iter_mut().zip(headings(&xy)?) {
            *p = TrajectoryPoint::new(p.x, p.y, p.z, yaw, p.speed);
        }
    }

    Ok(points)
}
