//! Lanelet2 OSM XML reader
//!
//! Scrapes `node`, `way` and `relation` elements from the top level of the
//! document. Elements are kept in document order, which the extractor and the
//! first-node origin policy rely on.
//!
//! Individual malformed elements are dropped rather than failing the whole
//! read: a node without usable coordinates, a way or relation without an id,
//! an `nd` without a `ref`, a `tag` without `k`/`v`. Only a document that is
//! not well-formed XML is an error.

use log::debug;
use raceline_common::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

/// Map node with geodetic coordinates and optional precomputed local frame
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub lat: f64,
    pub lon: f64,
    pub local_x: Option<f64>,
    pub local_y: Option<f64>,
}

/// Way with its ordered node references and tags
#[derive(Debug, Clone, PartialEq)]
pub struct Way {
    pub id: String,
    pub node_ids: Vec<String>,
    pub tags: HashMap<String, String>,
}

/// Relation member; `kind` is the `type` attribute (`way`, `node`, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub kind: String,
    pub ref_id: String,
    pub role: String,
}

/// Relation with ordered members and tags
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub id: String,
    pub members: Vec<Member>,
    pub tags: HashMap<String, String>,
}

impl Relation {
    /// True for `type=lanelet`.
    pub fn is_lanelet(&self) -> bool {
        self.tags.get("type").map(String::as_str) == Some("lanelet")
    }
}

/// Parsed map graph
#[derive(Debug, Default)]
pub struct OsmMap {
    nodes: HashMap<String, Node>,
    node_order: Vec<String>,
    ways: Vec<Way>,
    way_index: HashMap<String, usize>,
    relations: Vec<Relation>,
    relation_index: HashMap<String, usize>,
}

/// Counters collected while scraping, reported at debug level
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParseStats {
    pub dropped_nodes: usize,
    pub dropped_ways: usize,
    pub dropped_relations: usize,
}

impl OsmMap {
    /// Read and parse a map file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::file(path, e))?;
        Self::parse_named(&text, &path.display().to_string())
    }

    /// Parse a map document held in memory.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_named(text, "<memory>")
    }

    fn parse_named(text: &str, input: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(text).map_err(|e| Error::ParseError {
            input: input.to_string(),
            message: e.to_string(),
        })?;

        let mut map = OsmMap::default();
        let mut stats = ParseStats::default();

        for obj in doc.root_element().children().filter(|n| n.is_element()) {
            match obj.tag_name().name() {
                "node" => match read_node(obj) {
                    Some((id, node)) => map.insert_node(id, node),
                    None => stats.dropped_nodes += 1,
                },
                "way" => match read_way(obj) {
                    Some(way) => map.insert_way(way),
                    None => stats.dropped_ways += 1,
                },
                "relation" => match read_relation(obj) {
                    Some(rel) => map.insert_relation(rel),
                    None => stats.dropped_relations += 1,
                },
                _ => {}
            }
        }

        debug!(
            "Parsed {input}: {} nodes, {} ways, {} relations (dropped {} / {} / {})",
            map.nodes.len(),
            map.ways.len(),
            map.relations.len(),
            stats.dropped_nodes,
            stats.dropped_ways,
            stats.dropped_relations
        );

        Ok(map)
    }

    // Duplicate ids replace the earlier element but keep its position.
    fn insert_node(&mut self, id: String, node: Node) {
        if self.nodes.insert(id.clone(), node).is_none() {
            self.node_order.push(id);
        }
    }

    fn insert_way(&mut self, way: Way) {
        match self.way_index.get(&way.id) {
            Some(&i) => self.ways[i] = way,
            None => {
                self.way_index.insert(way.id.clone(), self.ways.len());
                self.ways.push(way);
            }
        }
    }

    fn insert_relation(&mut self, rel: Relation) {
        match self.relation_index.get(&rel.id) {
            Some(&i) => self.relations[i] = rel,
            None => {
                self.relation_index.insert(rel.id.clone(), self.relations.len());
                self.relations.push(rel);
            }
        }
    }

    /// Node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Way by id.
    pub fn way(&self, id: &str) -> Option<&Way> {
        self.way_index.get(id).map(|&i| &self.ways[i])
    }

    /// Relation by id.
    pub fn relation(&self, id: &str) -> Option<&Relation> {
        self.relation_index.get(id).map(|&i| &self.relations[i])
    }

    /// First node in document order.
    pub fn first_node(&self) -> Option<&Node> {
        self.node_order.first().and_then(|id| self.nodes.get(id))
    }

    /// Ways in document order.
    pub fn ways(&self) -> &[Way] {
        &self.ways
    }

    /// Relations in document order.
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Number of distinct nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Resolve a way's node list to nodes, skipping references to missing nodes.
    pub fn way_nodes(&self, way_id: &str) -> Vec<&Node> {
        match self.way(way_id) {
            Some(way) => way.node_ids.iter().filter_map(|id| self.node(id)).collect(),
            None => Vec::new(),
        }
    }
}

fn parse_coord(text: Option<&str>) -> Option<f64> {
    let text = text?.trim();
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>().ok()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn read_node(obj: roxmltree::Node) -> Option<(String, Node)> {
    let id = non_empty(obj.attribute("id"))?;
    let lat = parse_coord(obj.attribute("lat"))?;
    let lon = parse_coord(obj.attribute("lon"))?;

    let mut local_x = None;
    let mut local_y = None;
    for (k, v) in read_tag_pairs(obj) {
        // A malformed value never clears an earlier valid one
        let slot = match k {
            "local_x" => &mut local_x,
            "local_y" => &mut local_y,
            _ => continue,
        };
        if let Ok(value) = v.trim().parse::<f64>() {
            *slot = Some(value);
        }
    }

    Some((
        id.to_string(),
        Node {
            lat,
            lon,
            local_x,
            local_y,
        },
    ))
}

fn read_way(obj: roxmltree::Node) -> Option<Way> {
    let id = non_empty(obj.attribute("id"))?;
    let node_ids = obj
        .children()
        .filter(|c| c.is_element() && c.tag_name().name() == "nd")
        .filter_map(|c| non_empty(c.attribute("ref")))
        .map(str::to_string)
        .collect();

    Some(Way {
        id: id.to_string(),
        node_ids,
        tags: read_tags(obj),
    })
}

fn read_relation(obj: roxmltree::Node) -> Option<Relation> {
    let id = non_empty(obj.attribute("id"))?;
    let members = obj
        .children()
        .filter(|c| c.is_element() && c.tag_name().name() == "member")
        .filter_map(|c| {
            let kind = non_empty(c.attribute("type"))?;
            let ref_id = non_empty(c.attribute("ref"))?;
            Some(Member {
                kind: kind.to_string(),
                ref_id: ref_id.to_string(),
                role: c.attribute("role").unwrap_or_default().to_string(),
            })
        })
        .collect();

    Some(Relation {
        id: id.to_string(),
        members,
        tags: read_tags(obj),
    })
}

fn read_tag_pairs<'a>(obj: roxmltree::Node<'a, 'a>) -> impl Iterator<Item = (&'a str, &'a str)> {
    obj.children()
        .filter(|c| c.is_element() && c.tag_name().name() == "tag")
        .filter_map(|c| Some((c.attribute("k")?, c.attribute("v")?)))
}

fn read_tags(obj: roxmltree::Node) -> HashMap<String, String> {
    read_tag_pairs(obj)
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
