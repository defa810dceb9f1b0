//! Attribute and child rule validation.

use crate::{Observe, Scope, Validate};
use arbor_core::{NodeId, Value, Violation, Violations};
use arbor_dom::{AttributeEvent, ChildEvent, Dom, DomError, DomResult};
use arbor_schema::{AttributeInfo, ChildInfo, FieldMetadata, FieldSlot, NodeType};
use arbor_transaction::BeginArgs;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Checks attribute rules and child rules for everything changed in a
/// transaction. Violations fail the commit.
#[derive(Debug, Default)]
pub struct DataValidator {
    attributes: RefCell<BTreeMap<(NodeId, FieldSlot), (Rc<AttributeInfo>, Value)>>,
    children: RefCell<BTreeMap<(NodeId, FieldSlot), Rc<ChildInfo>>>,
}

impl DataValidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn touch_children(&self, parent: NodeId, info: &Rc<ChildInfo>) {
        self.children
            .borrow_mut()
            .insert((parent, info.slot()), info.clone());
    }

    fn clear(&self) {
        self.attributes.borrow_mut().clear();
        self.children.borrow_mut().clear();
    }

    fn check_children(&self, dom: &Dom, parent: NodeId, info: &ChildInfo) -> DomResult<Result<(), String>> {
        let held = if info.is_list() {
            dom.get_children(parent, info)?
        } else {
            dom.get_child(parent, info)?.into_iter().collect()
        };
        let types = held
            .into_iter()
            .map(|child| dom.node_type(child))
            .collect::<DomResult<Vec<Rc<NodeType>>>>()?;
        Ok(info.validate(&types))
    }
}

impl Observe for DataValidator {
    fn add_node(&self, dom: &mut Dom, scope: &Scope, node: NodeId) -> DomResult<()> {
        if scope.is_validating() {
            for info in dom.node_type(node)?.children()? {
                self.touch_children(node, info);
            }
        }
        Ok(())
    }

    fn attribute_changed(&self, _dom: &mut Dom, scope: &Scope, event: &AttributeEvent) -> DomResult<()> {
        if scope.is_validating() {
            self.attributes.borrow_mut().insert(
                (event.node, event.attribute.slot()),
                (event.attribute.clone(), event.new_value.clone()),
            );
        }
        Ok(())
    }

    fn child_inserted(&self, _dom: &mut Dom, scope: &Scope, event: &ChildEvent) -> DomResult<()> {
        if scope.is_validating() {
            self.touch_children(event.parent, &event.child_info);
        }
        Ok(())
    }

    fn child_removed(&self, _dom: &mut Dom, scope: &Scope, event: &ChildEvent) -> DomResult<()> {
        if scope.is_validating() {
            self.touch_children(event.parent, &event.child_info);
        }
        Ok(())
    }
}

impl Validate for DataValidator {
    fn beginning(&self, _dom: &mut Dom, _scope: &Scope, _args: &mut BeginArgs) -> DomResult<()> {
        self.clear();
        Ok(())
    }

    fn ending(&self, dom: &mut Dom, scope: &Scope) -> DomResult<()> {
        let attributes = std::mem::take(&mut *self.attributes.borrow_mut());
        let children = std::mem::take(&mut *self.children.borrow_mut());
        let mut violations = Violations::new();

        for ((node, _), (info, value)) in attributes {
            if !scope.contains(dom, node) {
                continue;
            }
            if let Err(message) = info.validate(&value) {
                violations.push(Violation::error("attribute", message).with_node(node));
            }
        }
        for ((parent, _), info) in children {
            if !scope.contains(dom, parent) {
                continue;
            }
            if let Err(message) = self.check_children(dom, parent, &info)? {
                violations.push(Violation::error("child", message).with_node(parent));
            }
        }

        if violations.has_errors() {
            tracing::warn!(violations = %violations, "data validation failed");
            return Err(DomError::Validation(violations));
        }
        Ok(())
    }

    fn cancelled(&self, _dom: &mut Dom, _scope: &Scope) -> DomResult<()> {
        self.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixture, tree};
    use crate::Validator;
    use arbor_schema::{AttrDef, AttributeType, ChildCountRule, ChildDef, NumericRangeRule};

    #[test]
    fn test_rule_violation_fails_commit() {
        // GIVEN
        let f = fixture(|doc, _| {
            doc.define_attribute(
                AttrDef::new("percent", AttributeType::int32())
                    .with_rule(NumericRangeRule::new(0.0, 100.0)),
            )?;
            doc.define_extension(Validator::extension("data", DataValidator::new))
        });
        let percent = f.document.attribute("percent").unwrap();
        let mut dom = Dom::new();
        let (root, ctx) = tree(&mut dom, &f);

        // WHEN
        ctx.begin(&mut dom, "edit").unwrap();
        dom.set_attribute(root, &percent, 150).unwrap();
        dom.set_attribute(root, &percent, 120).unwrap();
        let result = ctx.end(&mut dom);

        // THEN
        match result {
            Err(DomError::Validation(violations)) => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations.all()[0].node, Some(root));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
        ctx.cancel(&mut dom).unwrap();
        assert!(dom.is_default(root, &percent).unwrap());
    }

    #[test]
    fn test_last_value_wins() {
        let f = fixture(|doc, _| {
            doc.define_attribute(
                AttrDef::new("percent", AttributeType::int32())
                    .with_rule(NumericRangeRule::new(0.0, 100.0)),
            )?;
            doc.define_extension(Validator::extension("data", DataValidator::new))
        });
        let percent = f.document.attribute("percent").unwrap();
        let mut dom = Dom::new();
        let (root, ctx) = tree(&mut dom, &f);
        ctx.do_transaction(&mut dom, "edit", |dom| {
            dom.set_attribute(root, &percent, 150)?;
            dom.set_attribute(root, &percent, 50)
        })
        .unwrap();
        assert_eq!(dom.get_attribute(root, &percent).unwrap(), Value::Int32(50));
    }

    #[test]
    fn test_child_rule_checked_on_removal() {
        // GIVEN
        let f = fixture(|doc, item| {
            doc.define_child(
                ChildDef::new("pinned", item)
                    .list()
                    .with_rule(ChildCountRule::at_least(1)),
            )?;
            doc.define_extension(Validator::extension("data", DataValidator::new))
        });
        let pinned = f.document.child("pinned").unwrap();
        let mut dom = Dom::new();
        let (root, ctx) = tree(&mut dom, &f);
        let a = f.item(&mut dom, "a");
        dom.add_child(root, &pinned, a).unwrap();

        // WHEN
        let result = ctx.do_transaction(&mut dom, "unpin", |dom| dom.remove_from_parent(a));

        // THEN
        assert!(result.unwrap_err().is_validation());
        assert_eq!(dom.get_children(root, &pinned).unwrap(), vec![a]);
    }
}
