use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const MAP: &str = r#"<osm>
  <node id="1" lat="0.0" lon="0.0"/>
  <node id="2" lat="0.0001" lon="0.0"/>
  <node id="3" lat="0.0" lon="0.00004"/>
  <node id="4" lat="0.0001" lon="0.00004"/>
  <way id="10"><nd ref="1"/><nd ref="2"/></way>
  <way id="11"><nd ref="3"/><nd ref="4"/></way>
  <relation id="20">
    <member type="way" ref="10" role="left"/>
    <member type="way" ref="11" role="right"/>
    <tag k="type" v="lanelet"/>
  </relation>
</osm>
"#;

fn raceline_cmd() -> Command {
    Command::cargo_bin("raceline").unwrap()
}

fn write_map(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("map.osm");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_help_shows_subcommands() {
    raceline_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("bounds"))
        .stdout(predicate::str::contains("centerline"))
        .stdout(predicate::str::contains("profile"))
        .stdout(predicate::str::contains("midline"));
}

#[test]
fn test_bounds_writes_role_files() {
    let tmp = TempDir::new().unwrap();
    let map = write_map(&tmp, MAP);
    let outdir = tmp.path().join("bounds");

    raceline_cmd()
        .args(["bounds", "--osm"])
        .arg(&map)
        .arg("--outdir")
        .arg(&outdir)
        .args(["--origin-lat", "0", "--origin-lon", "0"])
        .assert()
        .success();

    let left = fs::read_to_string(outdir.join("left.csv")).unwrap();
    let lines: Vec<_> = left.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "20,left,0,0.0000000000,0.0000000000,0.0000,0.0000,,");
    assert_eq!(lines[2], "20,left,1,0.0001000000,0.0000000000,0.0000,11.1195,,");
    assert!(outdir.join("right.csv").exists());
    assert_eq!(fs::read_to_string(outdir.join("centerline.csv")).unwrap().lines().count(), 1);
}

#[test]
fn test_bounds_single_csv_and_midline() {
    let tmp = TempDir::new().unwrap();
    let map = write_map(&tmp, MAP);
    let single = tmp.path().join("all.csv");
    let outdir = tmp.path().join("bounds");
    let midline = tmp.path().join("mid.csv");

    raceline_cmd()
        .args(["bounds", "--osm"])
        .arg(&map)
        .arg("--single-csv")
        .arg(&single)
        .arg("--outdir")
        .arg(&outdir)
        .assert()
        .success();
    assert_eq!(fs::read_to_string(&single).unwrap().lines().count(), 5);

    raceline_cmd()
        .args(["midline", "--bounds-dir"])
        .arg(&outdir)
        .arg("--output")
        .arg(&midline)
        .assert()
        .success();
    let mid = fs::read_to_string(&midline).unwrap();
    assert!(mid.starts_with("x,y,z,x_quat,y_quat,z_quat,w_quat,speed\n"));
    assert_eq!(mid.lines().count(), 3);
}

#[test]
fn test_centerline_from_left_role() {
    let tmp = TempDir::new().unwrap();
    let map = write_map(&tmp, MAP);
    let output = tmp.path().join("traj.csv");

    raceline_cmd()
        .args(["centerline", "--role", "left", "--profile", "--osm"])
        .arg(&map)
        .arg("-o")
        .arg(&output)
        .assert()
        .success();
    let text = fs::read_to_string(&output).unwrap();
    assert_eq!(text.lines().count(), 3);
    assert!(text.lines().skip(1).all(|l| l.ends_with(",10.5")));
}

#[test]
fn test_missing_osm_argument_fails() {
    raceline_cmd()
        .args(["bounds", "--outdir", "unused"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--osm"));
}

#[test]
fn test_map_without_bounds_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let map = write_map(&tmp, r#"<osm><node id="1" lat="0" lon="0"/></osm>"#);
    let outdir = tmp.path().join("bounds");

    raceline_cmd()
        .args(["bounds", "--osm"])
        .arg(&map)
        .arg("--outdir")
        .arg(&outdir)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Not enough data"));
    assert!(!outdir.exists());
}

#[test]
fn test_half_origin_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let map = write_map(&tmp, MAP);

    raceline_cmd()
        .args(["bounds", "--origin-lat", "35", "--osm"])
        .arg(&map)
        .arg("--outdir")
        .arg(tmp.path().join("bounds"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--origin-lon"));
}

#[test]
fn test_profile_reports_schema_error() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("bad.csv");
    fs::write(&input, "east,north\n0,0\n1,0\n").unwrap();

    raceline_cmd()
        .args(["profile", "--input"])
        .arg(&input)
        .arg("--output")
        .arg(tmp.path().join("out.csv"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unsupported CSV schema"));
}

const MAP_WITH_CENTERLINE: &str = r#"<osm>
  <node id="1" lat="0.0" lon="0.0"/>
  <node id="2" lat="0.0001" lon="0.0"/>
  <node id="3" lat="0.0" lon="0.00004"/>
  <node id="4" lat="0.0001" lon="0.00004"/>
  <node id="5" lat="0.0" lon="0.00002"/>
  <node id="6" lat="0.0001" lon="0.00002"/>
  <way id="10"><nd ref="1"/><nd ref="2"/></way>
  <way id="11"><nd ref="3"/><nd ref="4"/></way>
  <way id="12"><nd ref="5"/><nd ref="6"/></way>
  <relation id="20">
    <member type="way" ref="12" role="centerline"/>
    <member type="way" ref="11" role="right"/>
    <member type="way" ref="10" role="left"/>
    <tag k="type" v="lanelet"/>
  </relation>
</osm>
"#;

#[test]
fn test_single_csv_lists_roles_in_order() {
    let tmp = TempDir::new().unwrap();
    let map = write_map(&tmp, MAP_WITH_CENTERLINE);
    let single = tmp.path().join("all.csv");

    raceline_cmd()
        .args(["bounds", "--osm"])
        .arg(&map)
        .arg("--single-csv")
        .arg(&single)
        .assert()
        .success();

    let text = fs::read_to_string(&single).unwrap();
    let roles: Vec<&str> = text
        .lines()
        .skip(1)
        .map(|l| l.split(',').nth(1).unwrap())
        .collect();
    assert_eq!(roles, ["left", "left", "right", "right", "centerline", "centerline"]);
}

#[test]
fn test_centerline_output_feeds_profile() {
    let tmp = TempDir::new().unwrap();
    let map = write_map(&tmp, MAP_WITH_CENTERLINE);
    let raw = tmp.path().join("raw.csv");
    let profiled = tmp.path().join("profiled.csv");

    raceline_cmd()
        .args(["centerline", "--origin-lat", "0", "--origin-lon", "0", "--osm"])
        .arg(&map)
        .arg("-o")
        .arg(&raw)
        .assert()
        .success();

    raceline_cmd()
        .args(["profile", "--lookahead", "3", "-i"])
        .arg(&raw)
        .arg("-o")
        .arg(&profiled)
        .assert()
        .success();

    let text = fs::read_to_string(&profiled).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "x,y,z,x_quat,y_quat,z_quat,w_quat,speed");
    assert!(lines[1..].iter().all(|l| l.ends_with(",10.5")));
}
