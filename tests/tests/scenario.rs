//! Library scenarios: ids, defaults, copies and data rules.

use arbor_tests::prelude::*;

mod uniqueness {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_duplicate_ids_in_one_transaction() {
        // GIVEN
        let lib = Library::new().unwrap();
        let mut dom = Dom::new();
        let (root, ctx) = lib.open(&mut dom).unwrap();

        // WHEN
        ctx.do_transaction(&mut dom, "add twice", |dom| {
            let first = lib.new_book(dom, "a")?;
            dom.add_child(root, &lib.items, first)?;
            let second = lib.new_book(dom, "a")?;
            dom.add_child(root, &lib.items, second)
        })
        .unwrap();

        // THEN
        assert_eq!(lib.names(&dom, root).unwrap(), vec!["a", "a_1"]);
        for book in dom.get_children(root, &lib.items).unwrap() {
            assert_eq!(dom.get_attribute(book, &lib.pages).unwrap(), Value::Int32(0));
        }
    }

    #[test]
    fn test_freed_suffix_is_reused() {
        // GIVEN
        let lib = Library::new().unwrap();
        let mut dom = Dom::new();
        let (root, ctx) = lib.open(&mut dom).unwrap();
        for _ in 0..3 {
            ctx.do_transaction(&mut dom, "add", |dom| {
                let book = lib.new_book(dom, "a")?;
                dom.add_child(root, &lib.items, book)
            })
            .unwrap();
        }
        assert_eq!(lib.names(&dom, root).unwrap(), vec!["a", "a_1", "a_2"]);

        // WHEN
        ctx.do_transaction(&mut dom, "drop a_1", |dom| {
            dom.remove_child(root, &lib.items, 1).map(|_| ())
        })
        .unwrap();
        ctx.do_transaction(&mut dom, "add", |dom| {
            let book = lib.new_book(dom, "a")?;
            dom.add_child(root, &lib.items, book)
        })
        .unwrap();

        // THEN
        assert_eq!(lib.names(&dom, root).unwrap(), vec!["a", "a_2", "a_1"]);
    }

    #[test]
    fn test_ids_are_unique_across_folders() {
        let lib = Library::new().unwrap();
        let mut dom = Dom::new();
        let (root, ctx) = lib.open(&mut dom).unwrap();

        let inner = ctx
            .do_transaction(&mut dom, "build", |dom| {
                let inner = lib.new_folder(dom, "shelf")?;
                dom.add_child(root, &lib.items, inner)?;
                let book = lib.new_book(dom, "shelf")?;
                dom.add_child(inner, &lib.items, book)?;
                Ok(inner)
            })
            .unwrap();

        assert_eq!(lib.names(&dom, root).unwrap(), vec!["shelf"]);
        assert_eq!(lib.names(&dom, inner).unwrap(), vec!["shelf_1"]);
    }

    #[test]
    fn test_rename_into_taken_id_fails() {
        let lib = Library::new().unwrap();
        let mut dom = Dom::new();
        let (root, ctx) = lib.open(&mut dom).unwrap();
        let a = lib.new_book(&mut dom, "a").unwrap();
        let b = lib.new_book(&mut dom, "b").unwrap();
        dom.add_child(root, &lib.items, a).unwrap();
        dom.add_child(root, &lib.items, b).unwrap();

        let result = ctx.do_transaction(&mut dom, "rename", |dom| dom.set_attribute(b, &lib.name, "a"));

        assert!(matches!(result, Err(DomError::InvalidOperation(_))));
        assert_eq!(lib.names(&dom, root).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_rename_policy_picks_free_variant() {
        let options = LibraryOptions::new()
            .with_unique(UniqueIdOptions::new().with_collision(CollisionPolicy::Rename));
        let lib = Library::with_options(options).unwrap();
        let mut dom = Dom::new();
        let (root, ctx) = lib.open(&mut dom).unwrap();
        let a = lib.new_book(&mut dom, "a").unwrap();
        let b = lib.new_book(&mut dom, "b").unwrap();
        dom.add_child(root, &lib.items, a).unwrap();
        dom.add_child(root, &lib.items, b).unwrap();

        ctx.do_transaction(&mut dom, "rename", |dom| dom.set_attribute(b, &lib.name, "a"))
            .unwrap();

        assert_eq!(lib.names(&dom, root).unwrap(), vec!["a", "a_1"]);
    }
}

mod data {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_out_of_range_pages_fail_commit() {
        // GIVEN
        let lib = Library::new().unwrap();
        let mut dom = Dom::new();
        let (root, ctx) = lib.open(&mut dom).unwrap();
        let book = lib.new_book(&mut dom, "thick").unwrap();
        dom.add_child(root, &lib.items, book).unwrap();

        // WHEN
        let result = ctx.do_transaction(&mut dom, "grow", |dom| dom.set_attribute(book, &lib.pages, 20_000));

        // THEN
        match result {
            Err(DomError::Validation(violations)) => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations.all()[0].node, Some(book));
            }
            other => panic!("expected a validation failure, got {other:?}"),
        }
        assert!(dom.is_default(book, &lib.pages).unwrap());
    }
}

mod copying {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_copy_keeps_internal_links() {
        // GIVEN
        let lib = Library::new().unwrap();
        let mut dom = Dom::new();
        let (root, _) = lib.open(&mut dom).unwrap();
        let shelf = lib.new_folder(&mut dom, "shelf").unwrap();
        let a = lib.new_book(&mut dom, "a").unwrap();
        let b = lib.new_book(&mut dom, "b").unwrap();
        let outside = lib.new_book(&mut dom, "outside").unwrap();
        dom.add_child(root, &lib.items, shelf).unwrap();
        dom.add_child(shelf, &lib.items, a).unwrap();
        dom.add_child(shelf, &lib.items, b).unwrap();
        dom.set_attribute(a, &lib.link, b).unwrap();
        dom.set_attribute(b, &lib.link, outside).unwrap();
        dom.set_attribute(a, &lib.tags, vec!["sci-fi", "classic"]).unwrap();

        // WHEN
        let copy = dom.copy(&[shelf]).unwrap()[0];

        // THEN
        assert_eq!(lib.names(&dom, copy).unwrap(), vec!["a", "b"]);
        let copied = dom.get_children(copy, &lib.items).unwrap();
        assert_eq!(
            snapshot(&dom, copied[0]).unwrap()["attributes"]["tags"],
            snapshot(&dom, a).unwrap()["attributes"]["tags"]
        );
        assert_eq!(
            dom.get_attribute(copied[0], &lib.link).unwrap(),
            Value::Reference(copied[1])
        );
        assert_eq!(
            dom.get_attribute(copied[1], &lib.link).unwrap(),
            Value::Reference(outside)
        );
        assert_eq!(dom.parent(copy).unwrap(), None);
    }
}
