//! Randomized edits followed by cancel leave the tree untouched.

use arbor_tests::prelude::*;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const NAMES: &[&str] = &["a", "b", "c", "shelf", "a_1"];

fn seed_library(lib: &Library, dom: &mut Dom, root: NodeId) -> DomResult<()> {
    for (folder_name, books) in [("fiction", 3), ("poetry", 2)] {
        let folder = lib.new_folder(dom, folder_name)?;
        dom.add_child(root, &lib.items, folder)?;
        for n in 0..books {
            let book = lib.new_book(dom, &format!("{folder_name}-{n}"))?;
            dom.add_child(folder, &lib.items, book)?;
            dom.set_attribute(book, &lib.pages, 100 * (n + 1) as i32)?;
        }
    }
    Ok(())
}

fn folders(lib: &Library, dom: &Dom, root: NodeId) -> Vec<NodeId> {
    dom.subtree(root)
        .filter(|n| dom.node_type(*n).unwrap().is_subtype_of(&lib.folder))
        .collect()
}

fn books(lib: &Library, dom: &Dom, root: NodeId) -> Vec<NodeId> {
    dom.subtree(root)
        .filter(|n| dom.node_type(*n).unwrap().is_subtype_of(&lib.book))
        .collect()
}

fn random_edit(lib: &Library, dom: &mut Dom, root: NodeId, rng: &mut StdRng, step: usize) -> DomResult<()> {
    let books = books(lib, dom, root);
    let folders = folders(lib, dom, root);
    match rng.gen_range(0..6) {
        0 => {
            if let Some(&book) = books.choose(rng) {
                dom.set_attribute(book, &lib.pages, rng.gen_range(0..500i32))?;
            }
        }
        1 => {
            if let Some(&book) = books.choose(rng) {
                let tags: Vec<String> = (0..rng.gen_range(0..3usize)).map(|i| format!("tag {i}")).collect();
                dom.set_attribute(book, &lib.tags, tags)?;
            }
        }
        2 => {
            if let Some(&folder) = folders.choose(rng) {
                let book = lib.new_book(dom, &format!("new-{step}"))?;
                dom.add_child(folder, &lib.items, book)?;
            }
        }
        3 => {
            if let Some(&book) = books.choose(rng) {
                dom.remove_from_parent(book)?;
            }
        }
        4 => {
            if let (Some(&book), Some(&folder)) = (books.choose(rng), folders.choose(rng)) {
                let len = dom.child_count(folder, &lib.items)?;
                dom.insert_child(folder, &lib.items, rng.gen_range(0..=len), book)?;
            }
        }
        _ => {
            if let Some(&node) = books.choose(rng) {
                let name = NAMES.choose(rng).copied().unwrap_or("a");
                dom.set_attribute(node, &lib.name, name)?;
            }
        }
    }
    Ok(())
}

#[test]
fn test_cancel_restores_snapshot() {
    for seed in 0..16 {
        // GIVEN
        let lib = Library::new().unwrap();
        let mut dom = Dom::new();
        let (root, ctx) = lib.open(&mut dom).unwrap();
        seed_library(&lib, &mut dom, root).unwrap();
        let log = lib.reporter(&dom, root).unwrap();
        log.hooks().listener().take();
        let before = snapshot(&dom, root).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);

        // WHEN
        ctx.begin(&mut dom, format!("random {seed}")).unwrap();
        for step in 0..24 {
            random_edit(&lib, &mut dom, root, &mut rng, step).unwrap();
        }
        ctx.cancel(&mut dom).unwrap();

        // THEN
        assert_eq!(snapshot(&dom, root).unwrap(), before, "seed {seed}");
        assert!(log.hooks().listener().is_empty());
    }
}

#[test]
fn test_names_usable_after_cancel() {
    // GIVEN
    let lib = Library::new().unwrap();
    let mut dom = Dom::new();
    let (root, ctx) = lib.open(&mut dom).unwrap();
    seed_library(&lib, &mut dom, root).unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    ctx.begin(&mut dom, "scratch").unwrap();
    for step in 0..24 {
        random_edit(&lib, &mut dom, root, &mut rng, step).unwrap();
    }
    ctx.cancel(&mut dom).unwrap();

    // WHEN
    ctx.do_transaction(&mut dom, "add", |dom| {
        let book = lib.new_book(dom, "fiction-0")?;
        dom.add_child(root, &lib.items, book)
    })
    .unwrap();

    // THEN
    let names = lib.names(&dom, root).unwrap();
    assert_eq!(names, vec!["fiction", "poetry", "fiction-0_1"]);
}
