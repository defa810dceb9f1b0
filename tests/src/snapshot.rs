//! JSON snapshot of a subtree.

use arbor_core::NodeId;
use arbor_dom::{Dom, DomResult};
use arbor_schema::FieldMetadata;
use serde_json::{json, Map, Value as Json};

/// The type, locally set attributes (in text form) and children of `node`,
/// recursively. Defaulted attributes and unset child fields are left out, so
/// two trees with the same content produce equal snapshots.
pub fn snapshot(dom: &Dom, node: NodeId) -> DomResult<Json> {
    let node_type = dom.node_type(node)?;

    let mut attributes = Map::new();
    for info in node_type.attributes()? {
        if dom.is_default(node, info)? {
            continue;
        }
        attributes.insert(
            info.name().to_string(),
            Json::String(dom.attribute_as_string(node, info)?),
        );
    }

    let mut children = Map::new();
    for info in node_type.children()? {
        if info.is_list() {
            let items = dom.get_children(node, info)?;
            if items.is_empty() {
                continue;
            }
            let items = items
                .into_iter()
                .map(|child| snapshot(dom, child))
                .collect::<DomResult<Vec<_>>>()?;
            children.insert(info.name().to_string(), Json::Array(items));
        } else if let Some(child) = dom.get_child(node, info)? {
            children.insert(info.name().to_string(), snapshot(dom, child)?);
        }
    }

    Ok(json!({
        "type": node_type.name(),
        "attributes": attributes,
        "children": children,
    }))
}
