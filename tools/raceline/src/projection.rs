//! Geodetic to local planar frame conversion
//!
//! Two projections are available. The equirectangular approximation is
//! closed-form and good for track-sized extents. The transverse Mercator
//! (UTM zone of the origin) is more accurate further from the origin; it falls
//! back to equirectangular when the zone cannot be set up.
//!
//! Both return meters relative to the origin, so a run must use one origin for
//! every point.

use crate::osm::OsmMap;
use log::{debug, warn};
use raceline_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the equirectangular approximation
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

// WGS84
const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;
const UTM_MAX_LAT: f64 = 84.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// How the local frame origin is chosen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OriginPolicy {
    /// Caller-supplied origin; reproducible regardless of document order
    Explicit(GeoPoint),
    /// First node of the map in document order
    FirstNode,
}

impl OriginPolicy {
    pub fn resolve(&self, map: &OsmMap) -> Result<GeoPoint> {
        match self {
            OriginPolicy::Explicit(origin) => Ok(*origin),
            OriginPolicy::FirstNode => {
                let node = map
                    .first_node()
                    .ok_or_else(|| Error::insufficient("origin from first node", 1, 0))?;
                warn!(
                    "No origin given, using first node ({:.10}, {:.10}); pass an explicit origin for reproducible output",
                    node.lat, node.lon
                );
                Ok(GeoPoint::new(node.lat, node.lon))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionKind {
    #[default]
    Equirectangular,
    Utm,
}

/// Equirectangular approximation relative to `origin`.
pub fn equirectangular(lat: f64, lon: f64, origin: GeoPoint) -> (f64, f64) {
    let phi_mid = (origin.lat.to_radians() + lat.to_radians()) * 0.5;
    let dphi = (lat - origin.lat).to_radians();
    let dlambda = (lon - origin.lon).to_radians();
    let x = EARTH_RADIUS_M * phi_mid.cos() * dlambda;
    let y = EARTH_RADIUS_M * dphi;
    (x, y)
}

/// UTM zone number for a longitude.
pub fn utm_zone(lon: f64) -> u8 {
    let zone = ((lon + 180.0) / 6.0).floor() as i32 + 1;
    zone.clamp(1, 60) as u8
}

/// Transverse Mercator on the WGS84 ellipsoid for a single UTM zone
#[derive(Debug, Clone, Copy)]
pub struct TransverseMercator {
    zone: u8,
    central_meridian: f64,
    false_northing: f64,
}

impl TransverseMercator {
    /// Set up the zone containing `origin`.
    pub fn for_origin(origin: GeoPoint) -> Option<Self> {
        if !origin.lat.is_finite() || !origin.lon.is_finite() || origin.lat.abs() > UTM_MAX_LAT {
            return None;
        }
        let zone = utm_zone(origin.lon);
        Some(Self {
            zone,
            central_meridian: (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0,
            false_northing: if origin.lat < 0.0 {
                UTM_FALSE_NORTHING_SOUTH
            } else {
                0.0
            },
        })
    }

    pub fn zone(&self) -> u8 {
        self.zone
    }

    /// Easting and northing in meters.
    pub fn forward(&self, lat: f64, lon: f64) -> (f64, f64) {
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let ep2 = e2 / (1.0 - e2);

        let phi = lat.to_radians();
        let (sin_phi, cos_phi) = phi.sin_cos();
        let tan_phi = phi.tan();

        let n = WGS84_A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let t = tan_phi * tan_phi;
        let c = ep2 * cos_phi * cos_phi;
        let a = cos_phi * (lon - self.central_meridian).to_radians();

        let m = WGS84_A
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * phi).sin());

        let a2 = a * a;
        let a3 = a2 * a;
        let a4 = a3 * a;
        let a5 = a4 * a;
        let a6 = a5 * a;

        let easting = UTM_K0
            * n
            * (a + (1.0 - t + c) * a3 / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a5 / 120.0)
            + UTM_FALSE_EASTING;

        let northing = UTM_K0
            * (m + n
                * tan_phi
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a6 / 720.0))
            + self.false_northing;

        (easting, northing)
    }
}

/// Converts geodetic points into the local frame of one origin
#[derive(Debug, Clone)]
pub struct Projector {
    origin: GeoPoint,
    utm: Option<(TransverseMercator, (f64, f64))>,
}

impl Projector {
    pub fn new(origin: GeoPoint, kind: ProjectionKind) -> Self {
        let utm = match kind {
            ProjectionKind::Equirectangular => None,
            ProjectionKind::Utm => match TransverseMercator::for_origin(origin) {
                Some(tm) => {
                    debug!("Using UTM zone {} for local frame", tm.zone());
                    Some((tm, tm.forward(origin.lat, origin.lon)))
                }
                None => {
                    debug!(
                        "UTM unavailable for origin ({}, {}), falling back to equirectangular",
                        origin.lat, origin.lon
                    );
                    None
                }
            },
        };
        Self { origin, utm }
    }

    pub fn equirectangular(origin: GeoPoint) -> Self {
        Self::new(origin, ProjectionKind::Equirectangular)
    }

    pub fn origin(&self) -> GeoPoint {
        self.origin
    }

    /// Projection actually in use after any fallback.
    pub fn kind(&self) -> ProjectionKind {
        if self.utm.is_some() {
            ProjectionKind::Utm
        } else {
            ProjectionKind::Equirectangular
        }
    }

    pub fn project(&self, lat: f64, lon: f64) -> (f64, f64) {
        match &self.utm {
            Some((tm, (x0, y0))) => {
                let (x, y) = tm.forward(lat, lon);
                (x - x0, y - y0)
            }
            None => equirectangular(lat, lon, self.origin),
        }
    }
}
