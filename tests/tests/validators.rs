//! The validator stack working together on a library.

use arbor_tests::prelude::*;

mod references {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_removing_sole_referent_detaches_owner() {
        // GIVEN
        let lib = Library::new().unwrap();
        let mut dom = Dom::new();
        let (root, ctx) = lib.open(&mut dom).unwrap();
        let original = lib.new_book(&mut dom, "original").unwrap();
        let sequel = lib.new_book(&mut dom, "sequel").unwrap();
        let unrelated = lib.new_book(&mut dom, "unrelated").unwrap();
        for book in [original, sequel, unrelated] {
            dom.add_child(root, &lib.items, book).unwrap();
        }
        dom.set_attribute(sequel, &lib.link, original).unwrap();

        // WHEN
        ctx.do_transaction(&mut dom, "drop original", |dom| dom.remove_from_parent(original))
            .unwrap();

        // THEN
        assert_eq!(lib.names(&dom, root).unwrap(), vec!["unrelated"]);
        assert_eq!(dom.parent(sequel).unwrap(), None);
    }

    #[test]
    fn test_removing_a_folder_cascades_to_outside_owners() {
        // GIVEN
        let lib = Library::new().unwrap();
        let mut dom = Dom::new();
        let (root, ctx) = lib.open(&mut dom).unwrap();
        let shelf = lib.new_folder(&mut dom, "shelf").unwrap();
        let inside = lib.new_book(&mut dom, "inside").unwrap();
        let index = lib.new_book(&mut dom, "index").unwrap();
        dom.add_child(root, &lib.items, shelf).unwrap();
        dom.add_child(shelf, &lib.items, inside).unwrap();
        dom.add_child(root, &lib.items, index).unwrap();
        dom.set_attribute(index, &lib.link, inside).unwrap();

        // WHEN
        ctx.do_transaction(&mut dom, "drop shelf", |dom| dom.remove_from_parent(shelf))
            .unwrap();

        // THEN
        assert!(lib.names(&dom, root).unwrap().is_empty());
    }

    #[test]
    fn test_cancel_keeps_reference_index() {
        let lib = Library::new().unwrap();
        let mut dom = Dom::new();
        let (root, ctx) = lib.open(&mut dom).unwrap();
        let a = lib.new_book(&mut dom, "a").unwrap();
        let b = lib.new_book(&mut dom, "b").unwrap();
        dom.add_child(root, &lib.items, a).unwrap();
        dom.add_child(root, &lib.items, b).unwrap();
        dom.set_attribute(b, &lib.link, a).unwrap();

        ctx.begin(&mut dom, "drop").unwrap();
        dom.remove_from_parent(b).unwrap();
        ctx.cancel(&mut dom).unwrap();

        let references = lib.references(&dom, root).unwrap();
        let to_a = references.hooks().references_to(a);
        assert_eq!(to_a.len(), 1);
        assert_eq!(to_a[0].owner, b);
    }
}

mod locking {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lock_violation_then_cancel() {
        // GIVEN
        let lib = Library::new().unwrap();
        let mut dom = Dom::new();
        let (root, ctx) = lib.open(&mut dom).unwrap();
        let archive = lib.new_folder(&mut dom, "archive").unwrap();
        let old = lib.new_book(&mut dom, "old").unwrap();
        dom.add_child(root, &lib.items, archive).unwrap();
        dom.add_child(archive, &lib.items, old).unwrap();
        dom.set_attribute(archive, &lib.locked, true).unwrap();
        let before = snapshot(&dom, root).unwrap();

        // WHEN
        ctx.begin(&mut dom, "edit archive").unwrap();
        dom.set_attribute(old, &lib.pages, 12).unwrap();
        dom.set_attribute(old, &lib.tags, vec!["worn"]).unwrap();
        let result = ctx.end(&mut dom);

        // THEN
        match result {
            Err(DomError::Validation(violations)) => {
                assert_eq!(violations.all()[0].rule, "locked");
                assert_eq!(violations.all()[0].node, Some(old));
            }
            other => panic!("expected a lock violation, got {other:?}"),
        }
        assert_eq!(ctx.phase(), TransactionPhase::Active);
        ctx.cancel(&mut dom).unwrap();
        assert_eq!(snapshot(&dom, root).unwrap(), before);
    }

    #[test]
    fn test_rejected_commit_keeps_names_taken() {
        // GIVEN
        let lib = Library::new().unwrap();
        let mut dom = Dom::new();
        let (root, ctx) = lib.open(&mut dom).unwrap();
        let a = lib.new_book(&mut dom, "a").unwrap();
        let vault = lib.new_folder(&mut dom, "vault").unwrap();
        dom.add_child(root, &lib.items, a).unwrap();
        dom.add_child(root, &lib.items, vault).unwrap();
        dom.set_attribute(vault, &lib.locked, true).unwrap();

        // WHEN
        ctx.begin(&mut dom, "sneak in").unwrap();
        let duplicate = lib.new_book(&mut dom, "a").unwrap();
        dom.add_child(root, &lib.items, duplicate).unwrap();
        let hidden = lib.new_book(&mut dom, "hidden").unwrap();
        dom.add_child(vault, &lib.items, hidden).unwrap();
        assert!(ctx.end(&mut dom).unwrap_err().is_validation());
        ctx.cancel(&mut dom).unwrap();
        assert_eq!(lib.names(&dom, root).unwrap(), vec!["a", "vault"]);

        ctx.do_transaction(&mut dom, "add", |dom| {
            let book = lib.new_book(dom, "a")?;
            dom.add_child(root, &lib.items, book)
        })
        .unwrap();

        // THEN
        assert_eq!(lib.names(&dom, root).unwrap(), vec!["a", "vault", "a_1"]);
    }

    #[test]
    fn test_unlocked_entries_stay_editable() {
        let lib = Library::new().unwrap();
        let mut dom = Dom::new();
        let (root, ctx) = lib.open(&mut dom).unwrap();
        let archive = lib.new_folder(&mut dom, "archive").unwrap();
        let desk = lib.new_folder(&mut dom, "desk").unwrap();
        let draft = lib.new_book(&mut dom, "draft").unwrap();
        dom.add_child(root, &lib.items, archive).unwrap();
        dom.add_child(root, &lib.items, desk).unwrap();
        dom.add_child(desk, &lib.items, draft).unwrap();
        dom.set_attribute(archive, &lib.locked, true).unwrap();

        ctx.do_transaction(&mut dom, "edit desk", |dom| dom.set_attribute(draft, &lib.pages, 3))
            .unwrap();

        assert_eq!(dom.get_attribute(draft, &lib.pages).unwrap(), Value::Int32(3));
    }
}

mod reporting {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_repeated_sets_collapse() {
        // GIVEN
        let lib = Library::new().unwrap();
        let mut dom = Dom::new();
        let (root, ctx) = lib.open(&mut dom).unwrap();
        let book = lib.new_book(&mut dom, "book").unwrap();
        dom.add_child(root, &lib.items, book).unwrap();
        let reporter = lib.reporter(&dom, root).unwrap();
        assert_eq!(reporter.hooks().listener().take(), vec!["+book@0"]);

        // WHEN
        ctx.do_transaction(&mut dom, "edit", |dom| {
            for pages in [10, 20, 30] {
                dom.set_attribute(book, &lib.pages, pages)?;
            }
            Ok(())
        })
        .unwrap();

        // THEN
        assert_eq!(
            reporter.hooks().listener().take(),
            vec!["book.pages 0 -> 30", "commit"]
        );
    }

    #[test]
    fn test_renames_are_reported_after_inserts() {
        let lib = Library::new().unwrap();
        let mut dom = Dom::new();
        let (root, ctx) = lib.open(&mut dom).unwrap();
        let reporter = lib.reporter(&dom, root).unwrap();

        ctx.do_transaction(&mut dom, "add twice", |dom| {
            for _ in 0..2 {
                let book = lib.new_book(dom, "a")?;
                dom.add_child(root, &lib.items, book)?;
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(
            reporter.hooks().listener().take(),
            vec!["+a@0", "+a_1@1", "a_1.name \"a\" -> \"a_1\"", "commit"]
        );
    }

    #[test]
    fn test_failed_commit_reports_nothing() {
        let lib = Library::new().unwrap();
        let mut dom = Dom::new();
        let (root, ctx) = lib.open(&mut dom).unwrap();
        let book = lib.new_book(&mut dom, "book").unwrap();
        dom.add_child(root, &lib.items, book).unwrap();
        let reporter = lib.reporter(&dom, root).unwrap();
        reporter.hooks().listener().take();

        let result = ctx.do_transaction(&mut dom, "overflow", |dom| dom.set_attribute(book, &lib.pages, -1));

        assert!(result.unwrap_err().is_validation());
        assert!(reporter.hooks().listener().is_empty());
    }
}
