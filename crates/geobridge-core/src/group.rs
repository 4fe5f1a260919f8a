//! # Layer Groups
//!
//! Tree of named groups whose leaves are layer names.
//!
//! ```text
//! G  (title, abstract)
//! ├── L1                 layer
//! └── G2                 nested group
//!     └── L2             layer
//! ```
//!
//! The same tree is rendered twice by the publisher: once as a combined
//! style document and once as a server-side layer group. A member is a layer
//! when given as a bare string or as an object without `layers`; an object
//! with `layers` is a nested group:
//! `{"name": "G", "layers": [{"name": "L1"}, {"name": "G2", "layers": ["L2"]}]}`.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

use crate::error::{CoreError, CoreResult};

/// Deepest nesting accepted before traversal gives up.
pub const MAX_GROUP_DEPTH: usize = 32;

/// One entry of a group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GroupMember {
    Layer(String),
    Group(LayerGroup),
}

impl<'de> Deserialize<'de> for GroupMember {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct GroupRepr {
            name: String,
            #[serde(default)]
            title: String,
            #[serde(default, rename = "abstract")]
            abstract_text: String,
            layers: Vec<GroupMember>,
        }

        // Order matters: an object only counts as a group when it has `layers`
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Name(String),
            Group(GroupRepr),
            Layer { name: String },
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Name(name) | Repr::Layer { name } => GroupMember::Layer(name),
            Repr::Group(group) => GroupMember::Group(LayerGroup {
                name: group.name,
                title: group.title,
                abstract_text: group.abstract_text,
                layers: group.layers,
            }),
        })
    }
}

impl GroupMember {
    pub fn name(&self) -> &str {
        match self {
            GroupMember::Layer(name) => name,
            GroupMember::Group(group) => &group.name,
        }
    }
}

/// A named, ordered collection of layers and nested groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerGroup {
    pub name: String,

    #[serde(default)]
    pub title: String,

    #[serde(default, rename = "abstract")]
    pub abstract_text: String,

    #[serde(default)]
    pub layers: Vec<GroupMember>,
}

impl LayerGroup {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        LayerGroup {
            title: name.clone(),
            name,
            abstract_text: String::new(),
            layers: Vec::new(),
        }
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layers.push(GroupMember::Layer(layer.into()));
        self
    }

    pub fn with_group(mut self, group: LayerGroup) -> Self {
        self.layers.push(GroupMember::Group(group));
        self
    }

    /// Direct child groups, in order.
    pub fn child_groups(&self) -> impl Iterator<Item = &LayerGroup> {
        self.layers.iter().filter_map(|member| match member {
            GroupMember::Group(group) => Some(group),
            GroupMember::Layer(_) => None,
        })
    }

    /// Every layer name reachable from this group, depth-first, deduplicated.
    pub fn layer_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        self.collect_layers(&mut seen, &mut names);
        names
    }

    fn collect_layers(&self, seen: &mut HashSet<String>, names: &mut Vec<String>) {
        for member in &self.layers {
            match member {
                GroupMember::Layer(name) => {
                    if seen.insert(name.clone()) {
                        names.push(name.clone());
                    }
                }
                GroupMember::Group(group) => group.collect_layers(seen, names),
            }
        }
    }

    /// Groups in the order they must be created: every nested group before
    /// the group containing it, this group last.
    ///
    /// Call [`LayerGroup::validate`] first; a cyclic tree cannot be built
    /// from owned values, but duplicate names would be visited twice.
    pub fn publish_order(&self) -> Vec<&LayerGroup> {
        let mut order = Vec::new();
        self.collect_post_order(&mut order);
        order
    }

    fn collect_post_order<'a>(&'a self, order: &mut Vec<&'a LayerGroup>) {
        for child in self.child_groups() {
            child.collect_post_order(order);
        }
        order.push(self);
    }

    /// Checks the tree invariants.
    ///
    /// ## Rules
    /// - No group contains (transitively) a group of its own name
    /// - Nesting depth is at most [`MAX_GROUP_DEPTH`]
    /// - Group names are unique across the tree
    pub fn validate(&self) -> CoreResult<()> {
        let mut path = Vec::new();
        let mut declared = HashSet::new();
        self.walk(&mut path, &mut declared)
    }

    fn walk(&self, path: &mut Vec<String>, declared: &mut HashSet<String>) -> CoreResult<()> {
        if path.iter().any(|ancestor| ancestor == &self.name) {
            let mut cycle = path.clone();
            cycle.push(self.name.clone());
            return Err(CoreError::CyclicGroup { path: cycle });
        }
        if path.len() >= MAX_GROUP_DEPTH {
            return Err(CoreError::GroupTooDeep {
                group: self.name.clone(),
                max: MAX_GROUP_DEPTH,
            });
        }
        if !declared.insert(self.name.clone()) {
            return Err(CoreError::DuplicateGroup(self.name.clone()));
        }

        path.push(self.name.clone());
        for child in self.child_groups() {
            child.walk(path, declared)?;
        }
        path.pop();
        Ok(())
    }
}

/// Validates a forest of top-level groups, including name clashes between
/// separate trees.
pub fn validate_groups(groups: &[LayerGroup]) -> CoreResult<()> {
    let mut declared = HashSet::new();
    for group in groups {
        let mut path = Vec::new();
        group.walk(&mut path, &mut declared)?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_mixed_members() {
        let group: LayerGroup = serde_json::from_str(
            r#"{"name": "G", "layers": [{"name": "L1"}, {"name": "G2", "layers": ["L2"]}]}"#,
        )
        .unwrap();

        assert_eq!(group.layers.len(), 2);
        assert_eq!(group.layers[0], GroupMember::Layer("L1".into()));
        assert_eq!(group.layers[1].name(), "G2");
        assert!(matches!(group.layers[1], GroupMember::Group(_)));

        let plain: LayerGroup =
            serde_json::from_str(r#"{"name": "G", "layers": ["L1", "L2"]}"#).unwrap();
        assert_eq!(plain.layers[0], GroupMember::Layer("L1".into()));
        assert_eq!(plain.title, "");
    }

    #[test]
    fn test_layer_names_are_depth_first_and_unique() {
        let group = LayerGroup::new("G")
            .with_layer("L1")
            .with_group(LayerGroup::new("G2").with_layer("L2").with_layer("L1"))
            .with_layer("L3");
        assert_eq!(group.layer_names(), vec!["L1", "L2", "L3"]);
    }

    #[test]
    fn test_publish_order_is_children_first() {
        let group = LayerGroup::new("G")
            .with_group(LayerGroup::new("A").with_group(LayerGroup::new("A1")))
            .with_layer("L")
            .with_group(LayerGroup::new("B"));
        let order: Vec<&str> = group.publish_order().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(order, vec!["A1", "A", "B", "G"]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let group = LayerGroup::new("G").with_group(LayerGroup::new("G2").with_group(LayerGroup::new("G")));
        match group.validate() {
            Err(CoreError::CyclicGroup { path }) => assert_eq!(path, vec!["G", "G2", "G"]),
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_sibling_groups_rejected() {
        let group = LayerGroup::new("G")
            .with_group(LayerGroup::new("A"))
            .with_group(LayerGroup::new("A"));
        assert!(matches!(group.validate(), Err(CoreError::DuplicateGroup(name)) if name == "A"));

        let forest = vec![LayerGroup::new("A"), LayerGroup::new("B").with_group(LayerGroup::new("A"))];
        assert!(validate_groups(&forest).is_err());
    }

    #[test]
    fn test_depth_bound() {
        let mut group = LayerGroup::new(format!("g{}", MAX_GROUP_DEPTH + 1));
        for level in (0..=MAX_GROUP_DEPTH).rev() {
            group = LayerGroup::new(format!("g{}", level)).with_group(group);
        }
        assert!(matches!(group.validate(), Err(CoreError::GroupTooDeep { .. })));

        let shallow = LayerGroup::new("a").with_group(LayerGroup::new("b").with_layer("x"));
        assert!(shallow.validate().is_ok());
    }
}
