//! Text log of reported changes.

use arbor_core::NodeId;
use arbor_dom::{Dom, DomResult};
use arbor_schema::FieldMetadata;
use arbor_validation::{AttributeChange, ChildChange, ReportListener};
use std::cell::RefCell;

/// Records every reported change as one line:
/// `name.attribute old -> new`, `+name@index` or `-name@index`, and
/// `commit` after each replayed transaction.
#[derive(Debug, Default)]
pub struct ChangeLog {
    lines: RefCell<Vec<String>>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the recorded lines.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.borrow_mut())
    }

    pub fn is_empty(&self) -> bool {
        self.lines.borrow().is_empty()
    }

    fn push(&self, line: String) {
        self.lines.borrow_mut().push(line);
    }
}

fn label(dom: &Dom, node: NodeId) -> DomResult<String> {
    Ok(dom
        .id(node)?
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| node.to_string()))
}

impl ReportListener for ChangeLog {
    fn attribute_changed(&self, dom: &Dom, change: &AttributeChange) -> DomResult<()> {
        self.push(format!(
            "{}.{} {} -> {}",
            label(dom, change.node)?,
            change.attribute.name(),
            change.old_value,
            change.new_value
        ));
        Ok(())
    }

    fn child_inserted(&self, dom: &Dom, change: &ChildChange) -> DomResult<()> {
        self.push(format!("+{}@{}", label(dom, change.child)?, change.index));
        Ok(())
    }

    fn child_removed(&self, dom: &Dom, change: &ChildChange) -> DomResult<()> {
        self.push(format!("-{}@{}", label(dom, change.child)?, change.index));
        Ok(())
    }

    fn transaction_finished(&self, _dom: &Dom) -> DomResult<()> {
        self.push("commit".to_string());
        Ok(())
    }
}
