//! CLI commands for raceline

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};

use crate::extract::Role;
use crate::osm::OsmMap;
use crate::pipeline::{
    export_bounds, midline_from_dir, profile_file, write_centerline, BoundsExport, CenterlineOptions,
    DEFAULT_SPEED_KMH,
};
use crate::profile::ProfileConfig;
use crate::projection::{GeoPoint, OriginPolicy, ProjectionKind};

#[derive(Parser)]
#[command(name = "raceline")]
#[command(version, about = "Lanelet2 boundary extraction and raceline speed profiling", long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Local frame options shared by the map commands
#[derive(Args, Debug, Clone)]
pub struct FrameArgs {
    /// Origin latitude (degrees); defaults to the first node of the map
    #[arg(long, allow_hyphen_values = true)]
    pub origin_lat: Option<f64>,

    /// Origin longitude (degrees); defaults to the first node of the map
    #[arg(long, allow_hyphen_values = true)]
    pub origin_lon: Option<f64>,

    /// Planar projection for x/y
    #[arg(long, value_enum, default_value_t = ProjectionKind::Equirectangular)]
    pub projection: ProjectionKind,
}

impl FrameArgs {
    pub fn origin_policy(&self) -> Result<OriginPolicy> {
        match (self.origin_lat, self.origin_lon) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                    bail!("Origin ({lat}, {lon}) is out of range");
                }
                Ok(OriginPolicy::Explicit(GeoPoint::new(lat, lon)))
            }
            (None, None) => Ok(OriginPolicy::FirstNode),
            _ => bail!("--origin-lat and --origin-lon must be given together"),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract left/right/centerline bounds from a lanelet2 map into CSV
    Bounds {
        /// Input lanelet2 OSM XML file
        #[arg(long)]
        osm: PathBuf,

        /// Output directory for left.csv, right.csv and centerline.csv
        #[arg(short, long)]
        outdir: Option<PathBuf>,

        /// Also (or only) write every role into this single CSV
        #[arg(long)]
        single_csv: Option<PathBuf>,

        #[command(flatten)]
        frame: FrameArgs,
    },

    /// Build a trajectory CSV along one boundary role
    Centerline {
        /// Input lanelet2 OSM XML file
        #[arg(long)]
        osm: PathBuf,

        /// Output trajectory CSV
        #[arg(short, long)]
        output: PathBuf,

        /// Boundary role to follow
        #[arg(long, value_enum, default_value_t = Role::Centerline)]
        role: Role,

        /// Constant target speed in km/h
        #[arg(long, default_value_t = DEFAULT_SPEED_KMH)]
        speed_kmh: f64,

        /// z written on every point
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        z: f64,

        /// Derive speeds from curvature instead of --speed-kmh
        #[arg(long)]
        profile: bool,

        /// Profiler YAML config (implies --profile)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Use node local_x/local_y tags when present
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        prefer_local: bool,

        /// Fail when the role's ways cannot be joined end to end
        #[arg(long)]
        strict: bool,

        #[command(flatten)]
        frame: FrameArgs,
    },

    /// Recompute the speeds of a trajectory CSV from its curvature
    Profile {
        /// Input trajectory CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Output trajectory CSV
        #[arg(short, long)]
        output: PathBuf,

        /// Profiler YAML config
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the lookahead distance in points
        #[arg(long)]
        lookahead: Option<usize>,
    },

    /// Build a trajectory through the midpoints of left.csv and right.csv
    Midline {
        /// Directory holding left.csv and right.csv
        #[arg(long)]
        bounds_dir: PathBuf,

        /// Output trajectory CSV
        #[arg(short, long)]
        output: PathBuf,

        /// Constant target speed in km/h
        #[arg(long, default_value_t = DEFAULT_SPEED_KMH)]
        speed_kmh: f64,
    },
}

fn load_profile_config(path: Option<&Path>, lookahead: Option<usize>) -> Result<ProfileConfig> {
    let mut config = match path {
        Some(path) => ProfileConfig::load(path)
            .with_context(|| format!("Failed to load profile config {}", path.display()))?,
        None => ProfileConfig::default(),
    };
    if let Some(lookahead) = lookahead {
        config.lookahead = lookahead;
        config.validate()?;
    }
    Ok(config)
}

fn check_speed(speed_kmh: f64) -> Result<()> {
    if !speed_kmh.is_finite() || speed_kmh < 0.0 {
        bail!("--speed-kmh must be a non-negative number, got {speed_kmh}");
    }
    Ok(())
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Bounds {
            osm,
            outdir,
            single_csv,
            frame,
        } => {
            let export = BoundsExport {
                outdir,
                single_csv,
                origin: frame.origin_policy()?,
                projection: frame.projection,
            };
            let map = OsmMap::from_path(&osm)
                .with_context(|| format!("Failed to read map {}", osm.display()))?;
            let report = export_bounds(&map, &export)?;
            info!(
                "Done ({}): left={}, right={}, centerline={}, {} file(s)",
                report.strategy,
                report.left,
                report.right,
                report.centerline,
                report.files.len()
            );
        }

        Commands::Centerline {
            osm,
            output,
            role,
            speed_kmh,
            z,
            profile,
            config,
            prefer_local,
            strict,
            frame,
        } => {
            check_speed(speed_kmh)?;
            let profile = if profile || config.is_some() {
                Some(load_profile_config(config.as_deref(), None)?)
            } else {
                None
            };
            let options = CenterlineOptions {
                role,
                speed_kmh,
                z,
                profile,
                prefer_local,
                strict,
                origin: frame.origin_policy()?,
                projection: frame.projection,
            };
            write_centerline(&osm, &output, &options)
                .with_context(|| format!("Failed to build {role} trajectory from {}", osm.display()))?;
        }

        Commands::Profile {
            input,
            output,
            config,
            lookahead,
        } => {
            let config = load_profile_config(config.as_deref(), lookahead)?;
            profile_file(&input, &output, &config)
                .with_context(|| format!("Failed to profile {}", input.display()))?;
        }

        Commands::Midline {
            bounds_dir,
            output,
            speed_kmh,
        } => {
            check_speed(speed_kmh)?;
            midline_from_dir(&bounds_dir, &output, speed_kmh)
                .with_context(|| format!("Failed to build midline from {}", bounds_dir.display()))?;
        }
    }

    Ok(())
}
