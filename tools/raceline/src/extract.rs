//! Lane boundary and centerline extraction
//!
//! Lanelet relations are the primary source: each `type=lanelet` relation
//! names its `left`, `right` and optional `centerline` ways. Maps that only
//! tag the ways themselves (`subtype=left_lane_bound` and friends) are handled
//! by a fallback that is used only when the relations yield no points at all.

use crate::osm::OsmMap;
use log::info;
use raceline_common::Error;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, clap::ValueEnum)]
pub enum Role {
    Left,
    Right,
    Centerline,
}

impl Role {
    /// Output order for combined files
    pub const ALL: [Role; 3] = [Role::Left, Role::Right, Role::Centerline];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Left => "left",
            Role::Right => "right",
            Role::Centerline => "centerline",
        }
    }

    /// Map a way `subtype` / `lane_subtype` value to a role.
    pub fn from_subtype(subtype: &str) -> Option<Role> {
        match subtype {
            "left_lane_bound" => Some(Role::Left),
            "right_lane_bound" => Some(Role::Right),
            "center_lane_line" => Some(Role::Centerline),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Role::Left),
            "right" => Ok(Role::Right),
            "centerline" => Ok(Role::Centerline),
            other => Err(Error::InvalidInput(format!(
                "unknown role '{other}', expected left, right or centerline"
            ))),
        }
    }
}

/// Geodetic point with the node's precomputed local coordinates, if any
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundPoint {
    pub lat: f64,
    pub lon: f64,
    pub local_x: Option<f64>,
    pub local_y: Option<f64>,
}

/// One extracted point: source relation (or way) id, index within its way
#[derive(Debug, Clone, PartialEq)]
pub struct RoleEntry {
    pub source_id: String,
    pub index: usize,
    pub point: BoundPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Relations,
    WaySubtype,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Relations => f.write_str("relations"),
            Strategy::WaySubtype => f.write_str("way-subtype"),
        }
    }
}

/// Way picked for a role, with the id reported as its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleWay {
    pub source_id: String,
    pub role: Role,
    pub way_id: String,
}

#[derive(Debug, Clone)]
pub struct LaneBounds {
    pub strategy: Strategy,
    pub left: Vec<RoleEntry>,
    pub right: Vec<RoleEntry>,
    pub centerline: Vec<RoleEntry>,
}

impl LaneBounds {
    fn empty(strategy: Strategy) -> Self {
        Self {
            strategy,
            left: Vec::new(),
            right: Vec::new(),
            centerline: Vec::new(),
        }
    }

    pub fn role(&self, role: Role) -> &[RoleEntry] {
        match role {
            Role::Left => &self.left,
            Role::Right => &self.right,
            Role::Centerline => &self.centerline,
        }
    }

    fn role_mut(&mut self, role: Role) -> &mut Vec<RoleEntry> {
        match role {
            Role::Left => &mut self.left,
            Role::Right => &mut self.right,
            Role::Centerline => &mut self.centerline,
        }
    }

    pub fn total_points(&self) -> usize {
        self.left.len() + self.right.len() + self.centerline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_points() == 0
    }
}

/// First way member per role of every lanelet relation.
pub fn relation_role_ways(map: &OsmMap) -> Vec<RoleWay> {
    let mut out = Vec::new();
    for rel in map.relations().iter().filter(|r| r.is_lanelet()) {
        for role in Role::ALL {
            let member = rel
                .members
                .iter()
                .find(|m| m.kind == "way" && m.role == role.as_str());
            if let Some(m) = member {
                out.push(RoleWay {
                    source_id: rel.id.clone(),
                    role,
                    way_id: m.ref_id.clone(),
                });
            }
        }
    }
    out
}

/// Ways whose `subtype` (or `lane_subtype`) names a boundary role.
pub fn subtype_role_ways(map: &OsmMap) -> Vec<RoleWay> {
    map.ways()
        .iter()
        .filter_map(|way| {
            let subtype = way
                .tags
                .get("subtype")
                .filter(|s| !s.is_empty())
                .or_else(|| way.tags.get("lane_subtype"))?;
            let role = Role::from_subtype(subtype)?;
            Some(RoleWay {
                source_id: way.id.clone(),
                role,
                way_id: way.id.clone(),
            })
        })
        .collect()
}

fn resolve(map: &OsmMap, role_ways: &[RoleWay], strategy: Strategy) -> LaneBounds {
    let mut bounds = LaneBounds::empty(strategy);
    for rw in role_ways {
        let entries = bounds.role_mut(rw.role);
        for (index, node) in map.way_nodes(&rw.way_id).into_iter().enumerate() {
            entries.push(RoleEntry {
                source_id: rw.source_id.clone(),
                index,
                point: BoundPoint {
                    lat: node.lat,
                    lon: node.lon,
                    local_x: node.local_x,
                    local_y: node.local_y,
                },
            });
        }
    }
    bounds
}

pub fn extract_by_relations(map: &OsmMap) -> LaneBounds {
    resolve(map, &relation_role_ways(map), Strategy::Relations)
}

pub fn extract_by_way_subtype(map: &OsmMap) -> LaneBounds {
    resolve(map, &subtype_role_ways(map), Strategy::WaySubtype)
}

/// Relations first; way subtypes only when the relations gave zero points.
pub fn extract_lane_bounds(map: &OsmMap) -> LaneBounds {
    let by_relations = extract_by_relations(map);
    let bounds = if by_relations.is_empty() {
        extract_by_way_subtype(map)
    } else {
        by_relations
    };
    info!(
        "Extracted ({}): left={}, right={}, centerline={}",
        bounds.strategy,
        bounds.left.len(),
        bounds.right.len(),
        bounds.centerline.len()
    );
    bounds
}

/// Ways contributing to `role`, under the same selection rule as
/// [`extract_lane_bounds`].
pub fn role_way_ids(map: &OsmMap, role: Role) -> (Strategy, Vec<String>) {
    let (strategy, role_ways) = if extract_by_relations(map).is_empty() {
        (Strategy::WaySubtype, subtype_role_ways(map))
    } else {
        (Strategy::Relations, relation_role_ways(map))
    };
    let ids = role_ways
        .into_iter()
        .filter(|rw| rw.role == role)
        .map(|rw| rw.way_id)
        .collect();
    (strategy, ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANELET_MAP: &str = r#"<osm>
  <node id="1" lat="0.0" lon="0.0"/>
  <node id="2" lat="0.0001" lon="0.0"/>
  <node id="3" lat="0.0002" lon="0.0"/>
  <node id="4" lat="0.0" lon="0.0001"/>
  <node id="5" lat="0.0001" lon="0.0001"/>
  <way id="10"><nd ref="1"/><nd ref="2"/><nd ref="3"/></way>
  <way id="11"><nd ref="4"/><nd ref="5"/></way>
  <way id="12"><nd ref="3"/><nd ref="5"/></way>
  <relation id="100">
    <member type="way" ref="10" role="left"/>
    <member type="way" ref="11" role="right"/>
    <member type="way" ref="12" role="left"/>
    <member type="node" ref="1" role="centerline"/>
    <tag k="type" v="lanelet"/>
  </relation>
  <relation id="101">
    <member type="way" ref="11" role="left"/>
    <tag k="type" v="regulatory_element"/>
  </relation>
</osm>"#;

    const SUBTYPE_MAP: &str = r#"<osm>
  <node id="1" lat="0.0" lon="0.0"><tag k="local_x" v="1.0"/><tag k="local_y" v="2.0"/></node>
  <node id="2" lat="0.0001" lon="0.0"/>
  <way id="20"><nd ref="1"/><nd ref="2"/><tag k="subtype" v="left_lane_bound"/></way>
  <way id="21"><nd ref="2"/><nd ref="1"/><tag k="lane_subtype" v="center_lane_line"/></way>
  <way id="22"><nd ref="1"/><tag k="subtype" v="road_border"/></way>
  <way id="23"><nd ref="1"/><tag k="subtype" v=""/><tag k="lane_subtype" v="right_lane_bound"/></way>
</osm>"#;

    #[test]
    fn test_role_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("middle".parse::<Role>().is_err());
    }

    #[test]
    fn test_relations_first_member_per_role() {
        let map = OsmMap::parse(LANELET_MAP).unwrap();
        let bounds = extract_lane_bounds(&map);
        assert_eq!(bounds.strategy, Strategy::Relations);
        // way 10 (3 nodes) wins over the second left member
        assert_eq!(bounds.left.len(), 3);
        assert_eq!(bounds.right.len(), 2);
        assert!(bounds.centerline.is_empty());
        assert!(bounds.left.iter().all(|e| e.source_id == "100"));
        let idx: Vec<_> = bounds.left.iter().map(|e| e.index).collect();
        assert_eq!(idx, vec![0, 1, 2]);
        assert_eq!(bounds.left[2].point.lat, 0.0002);
    }

    #[test]
    fn test_fallback_by_subtype() {
        let map = OsmMap::parse(SUBTYPE_MAP).unwrap();
        let bounds = extract_lane_bounds(&map);
        assert_eq!(bounds.strategy, Strategy::WaySubtype);
        assert_eq!(bounds.left.len(), 2);
        assert_eq!(bounds.centerline.len(), 2);
        assert_eq!(bounds.right.len(), 1);
        assert_eq!(bounds.left[0].source_id, "20");
        assert_eq!(bounds.left[0].point.local_x, Some(1.0));
        assert_eq!(bounds.centerline[0].point.lat, 0.0001);
    }

    #[test]
    fn test_no_per_role_fallback() {
        // The relation only provides a left bound; subtype ways are ignored.
        let xml = r#"<osm>
  <node id="1" lat="0.0" lon="0.0"/>
  <node id="2" lat="0.0001" lon="0.0"/>
  <way id="10"><nd ref="1"/><nd ref="2"/></way>
  <way id="20"><nd ref="1"/><nd ref="2"/><tag k="subtype" v="right_lane_bound"/></way>
  <relation id="100">
    <member type="way" ref="10" role="left"/>
    <tag k="type" v="lanelet"/>
  </relation>
</osm>"#;
        let map = OsmMap::parse(xml).unwrap();
        let bounds = extract_lane_bounds(&map);
        assert_eq!(bounds.strategy, Strategy::Relations);
        assert_eq!(bounds.left.len(), 2);
        assert!(bounds.right.is_empty());
    }

    #[test]
    fn test_relation_referencing_missing_way_falls_back() {
        let xml = r#"<osm>
  <node id="1" lat="0.0" lon="0.0"/>
  <way id="20"><nd ref="1"/><tag k="subtype" v="left_lane_bound"/></way>
  <relation id="100">
    <member type="way" ref="999" role="left"/>
    <tag k="type" v="lanelet"/>
  </relation>
</osm>"#;
        let map = OsmMap::parse(xml).unwrap();
        let bounds = extract_lane_bounds(&map);
        assert_eq!(bounds.strategy, Strategy::WaySubtype);
        assert_eq!(bounds.left.len(), 1);
    }

    #[test]
    fn test_empty_map_yields_nothing() {
        let map = OsmMap::parse("<osm/>").unwrap();
        assert!(extract_lane_bounds(&map).is_empty());
    }

    #[test]
    fn test_role_way_ids_follow_selection() {
        let map = OsmMap::parse(LANELET_MAP).unwrap();
        assert_eq!(
            role_way_ids(&map, Role::Left),
            (Strategy::Relations, vec!["10".to_string()])
        );

        let map = OsmMap::parse(SUBTYPE_MAP).unwrap();
        assert_eq!(
            role_way_ids(&map, Role::Centerline),
            (Strategy::WaySubtype, vec!["21".to_string()])
        );
    }
}
