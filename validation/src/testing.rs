//! Shared fixture for validator tests.

use arbor_core::NodeId;
use arbor_dom::Dom;
use arbor_schema::{
    AttrDef, AttributeInfo, AttributeType, ChildDef, ChildInfo, NodeType, Schema, SchemaResult,
};
use arbor_transaction::{TransactionContext, TransactionOptions};
use std::rc::Rc;

pub(crate) struct Fixture {
    pub _schema: Schema,
    pub document: Rc<NodeType>,
    pub item: Rc<NodeType>,
    pub name: Rc<AttributeInfo>,
    pub size: Rc<AttributeInfo>,
    pub locked: Rc<AttributeInfo>,
    pub link: Rc<AttributeInfo>,
    pub items: Rc<ChildInfo>,
}

impl Fixture {
    /// An unparented item with the given name.
    pub fn item(&self, dom: &mut Dom, name: &str) -> NodeId {
        let node = dom.create_node(&self.item).unwrap();
        dom.set_attribute(node, &self.name, name).unwrap();
        node
    }
}

/// `Folder` holds `items`; `Item` and `Document` derive from it. Only the
/// document type carries extensions, added by `extend(document, item)`.
pub(crate) fn fixture(
    extend: impl FnOnce(&Rc<NodeType>, &Rc<NodeType>) -> SchemaResult<()>,
) -> Fixture {
    let mut schema = Schema::new();
    let folder = schema.create_type("Folder", None).unwrap();
    let item = schema.create_type("Item", Some(&folder)).unwrap();
    let document = schema.create_type("Document", Some(&folder)).unwrap();
    folder
        .define_child(ChildDef::new("items", &item).list())
        .unwrap();
    item.define_attribute(AttrDef::new("name", AttributeType::string()))
        .unwrap();
    item.define_attribute(AttrDef::new("size", AttributeType::int32()).with_default(0))
        .unwrap();
    item.define_attribute(AttrDef::new("locked", AttributeType::boolean()))
        .unwrap();
    item.define_attribute(AttrDef::new("link", AttributeType::reference()))
        .unwrap();
    item.set_id_attribute("name").unwrap();
    document
        .define_extension(TransactionContext::extension(
            "transactions",
            TransactionOptions::default(),
        ))
        .unwrap();
    extend(&document, &item).unwrap();
    schema.freeze_all().unwrap();
    Fixture {
        name: item.attribute("name").unwrap(),
        size: item.attribute("size").unwrap(),
        locked: item.attribute("locked").unwrap(),
        link: item.attribute("link").unwrap(),
        items: folder.child("items").unwrap(),
        _schema: schema,
        document,
        item,
    }
}

/// A bound document root and its transaction context.
pub(crate) fn tree(dom: &mut Dom, f: &Fixture) -> (NodeId, Rc<TransactionContext>) {
    let root = dom.create_node(&f.document).unwrap();
    dom.initialize_extensions(root).unwrap();
    let ctx = dom.capability::<TransactionContext>(root).unwrap().unwrap();
    (root, ctx)
}
