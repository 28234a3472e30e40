//! Scene working set - the nodes a publish run collects from.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::PublishError;

pub const OBJECT_SET: &str = "objectSet";
pub const TRANSFORM: &str = "transform";
pub const INITIAL_SHADING_GROUP: &str = "initialShadingGroup";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub name: String,
    /// Upstream nodes feeding the shape (construction history).
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default)]
    pub shading_engines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    /// Member node names, for sets.
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub shapes: Vec<Shape>,
    #[serde(default)]
    pub translate: [f64; 3],
    #[serde(default)]
    pub rotate: [f64; 3],
    #[serde(default = "unit_scale")]
    pub scale: [f64; 3],
}

fn unit_scale() -> [f64; 3] {
    [1.0, 1.0, 1.0]
}

impl SceneNode {
    pub fn transform(name: &str) -> Self {
        Self {
            name: name.to_string(),
            node_type: TRANSFORM.to_string(),
            members: vec![],
            shapes: vec![],
            translate: [0.0; 3],
            rotate: [0.0; 3],
            scale: unit_scale(),
        }
    }

    pub fn set(name: &str, members: &[&str]) -> Self {
        Self {
            node_type: OBJECT_SET.to_string(),
            members: members.iter().map(|m| m.to_string()).collect(),
            ..Self::transform(name)
        }
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shapes.push(shape);
        self
    }

    pub fn is_set(&self) -> bool {
        self.node_type == OBJECT_SET
    }
}

impl Shape {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            history: vec![],
            shading_engines: vec![INITIAL_SHADING_GROUP.to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneGraph {
    #[serde(default)]
    pub nodes: Vec<SceneNode>,
}

impl SceneGraph {
    pub fn new(nodes: Vec<SceneNode>) -> Self {
        Self { nodes }
    }

    pub fn load(path: &Path) -> Result<Self, PublishError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn find(&self, name: &str) -> Option<&SceneNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Sets whose name ends with `suffix`.
    pub fn sets_with_suffix<'a>(&'a self, suffix: &'a str) -> impl Iterator<Item = &'a SceneNode> + 'a {
        self.nodes
            .iter()
            .filter(move |n| n.is_set() && n.name.ends_with(suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_defaults() {
        let scene: SceneGraph = serde_json::from_str(
            r#"{"nodes": [
                {"name": "body_geo", "type": "objectSet", "members": ["body"]},
                {"name": "body", "type": "transform", "shapes": [{"name": "bodyShape"}]}
            ]}"#,
        )
        .unwrap();
        let body = scene.find("body").unwrap();
        assert_eq!(body.scale, [1.0, 1.0, 1.0]);
        assert_eq!(body.translate, [0.0, 0.0, 0.0]);
        assert!(body.shapes[0].shading_engines.is_empty());
        assert_eq!(scene.sets_with_suffix("_geo").count(), 1);
    }
}
