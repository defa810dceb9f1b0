//! Library schema fixture.

use crate::ChangeLog;
use arbor_core::NodeId;
use arbor_dom::{Dom, DomError, DomResult};
use arbor_schema::{
    AttrDef, AttributeInfo, AttributeType, ChildDef, ChildInfo, NodeType, NumericRangeRule, Schema,
    SchemaResult,
};
use arbor_transaction::{TransactionContext, TransactionOptions};
use arbor_validation::{
    DataValidator, IdScope, LockingOptions, LockingValidator, ReferenceValidator,
    TransactionReporter, UniqueIdOptions, UniqueIdValidator, Validator,
};
use std::rc::Rc;

/// How the library root is wired.
#[derive(Debug, Clone, Default)]
pub struct LibraryOptions {
    pub transactions: TransactionOptions,
    pub unique: UniqueIdOptions,
    pub locking: LockingOptions,
}

impl LibraryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transactions(mut self, transactions: TransactionOptions) -> Self {
        self.transactions = transactions;
        self
    }

    pub fn with_unique(mut self, unique: UniqueIdOptions) -> Self {
        self.unique = unique;
        self
    }

    pub fn with_locking(mut self, locking: LockingOptions) -> Self {
        self.locking = locking;
        self
    }
}

/// `Entry` is the abstract base of `Folder` and `Book`. Folders hold
/// entries. `Library` is the root folder and carries the transaction
/// context and every validator.
///
/// ```text
/// Entry { name (id), locked, link }
///   Folder { items: [Entry] }
///     Library
///   Book { pages (0..=10000), tags }
/// ```
pub struct Library {
    pub schema: Schema,
    pub entry: Rc<NodeType>,
    pub folder: Rc<NodeType>,
    pub book: Rc<NodeType>,
    pub library: Rc<NodeType>,
    pub name: Rc<AttributeInfo>,
    pub locked: Rc<AttributeInfo>,
    pub link: Rc<AttributeInfo>,
    pub pages: Rc<AttributeInfo>,
    pub tags: Rc<AttributeInfo>,
    pub items: Rc<ChildInfo>,
}

pub type References = Validator<ReferenceValidator>;
pub type Reporter = Validator<TransactionReporter<ChangeLog>>;

impl Library {
    pub fn new() -> SchemaResult<Self> {
        Self::with_options(LibraryOptions::default())
    }

    pub fn with_options(options: LibraryOptions) -> SchemaResult<Self> {
        let mut schema = Schema::new();
        let entry = schema.create_abstract_type("Entry", None)?;
        let folder = schema.create_type("Folder", Some(&entry))?;
        let book = schema.create_type("Book", Some(&entry))?;
        let library = schema.create_type("Library", Some(&folder))?;

        entry.define_attribute(AttrDef::new("name", AttributeType::string()))?;
        entry.define_attribute(AttrDef::new("locked", AttributeType::boolean()))?;
        entry.define_attribute(AttrDef::new("link", AttributeType::reference()))?;
        entry.set_id_attribute("name")?;
        folder.define_child(ChildDef::new("items", &entry).list())?;
        book.define_attribute(
            AttrDef::new("pages", AttributeType::int32()).with_rule(NumericRangeRule::new(0.0, 10_000.0)),
        )?;
        book.define_attribute(AttrDef::new("tags", AttributeType::string_array()))?;

        let LibraryOptions {
            transactions,
            unique,
            locking,
        } = options;
        library.define_extension(TransactionContext::extension("transactions", transactions))?;
        library.define_extension(Validator::extension("data", DataValidator::new))?;
        library.define_extension(Validator::extension("unique", move || {
            UniqueIdValidator::new(IdScope::Subtree, unique.clone())
        }))?;
        library.define_extension(Validator::extension("locking", move || {
            LockingValidator::new(locking.clone())
        }))?;
        library.define_extension(Validator::extension("references", ReferenceValidator::new))?;
        library.define_extension(Validator::extension("reporter", || {
            TransactionReporter::new(ChangeLog::new())
        }))?;
        schema.freeze_all()?;

        Ok(Self {
            name: entry.attribute("name")?,
            locked: entry.attribute("locked")?,
            link: entry.attribute("link")?,
            pages: book.attribute("pages")?,
            tags: book.attribute("tags")?,
            items: folder.child("items")?,
            schema,
            entry,
            folder,
            book,
            library,
        })
    }

    /// A bound library root and its transaction context.
    pub fn open(&self, dom: &mut Dom) -> DomResult<(NodeId, Rc<TransactionContext>)> {
        let root = dom.create_node(&self.library)?;
        dom.set_attribute(root, &self.name, "library")?;
        dom.initialize_extensions(root)?;
        let context = dom
            .capability::<TransactionContext>(root)?
            .ok_or_else(|| DomError::invalid_operation("library has no transaction context"))?;
        Ok((root, context))
    }

    /// An unparented folder.
    pub fn new_folder(&self, dom: &mut Dom, name: &str) -> DomResult<NodeId> {
        let node = dom.create_node(&self.folder)?;
        dom.set_attribute(node, &self.name, name)?;
        Ok(node)
    }

    /// An unparented book.
    pub fn new_book(&self, dom: &mut Dom, name: &str) -> DomResult<NodeId> {
        let node = dom.create_node(&self.book)?;
        dom.set_attribute(node, &self.name, name)?;
        Ok(node)
    }

    /// Names of the entries directly under `folder`.
    pub fn names(&self, dom: &Dom, folder: NodeId) -> DomResult<Vec<String>> {
        dom.get_children(folder, &self.items)?
            .into_iter()
            .map(|node| Ok(dom.id(node)?.unwrap_or_default()))
            .collect()
    }

    pub fn reporter(&self, dom: &Dom, root: NodeId) -> DomResult<Rc<Reporter>> {
        dom.capability::<Reporter>(root)?
            .ok_or_else(|| DomError::invalid_operation("library has no reporter"))
    }

    pub fn references(&self, dom: &Dom, root: NodeId) -> DomResult<Rc<References>> {
        dom.capability::<References>(root)?
            .ok_or_else(|| DomError::invalid_operation("library has no reference index"))
    }
}
