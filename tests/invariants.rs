//! End-to-end tests over the public API: structural invariants under
//! mutation, query/mutate/render pipelines, and policy-built documents.

use loam::{
    AttrValue, Matcher, NodeId, RenderOptions, Strainer, Tree, TreePolicy,
};

/// Walk the document-order chain from the root and check that it is a
/// pre-order traversal, that the reverse chain mirrors it, and that sibling
/// links agree with the contents vectors.
fn assert_orderings_consistent(tree: &Tree) {
    let mut forward = vec![tree.root()];
    let mut cur = tree.root();
    while let Some(next) = tree.next_element(cur) {
        forward.push(next);
        cur = next;
    }

    let mut preorder = Vec::new();
    let mut stack = vec![tree.root()];
    while let Some(id) = stack.pop() {
        preorder.push(id);
        for &child in tree.contents(id).iter().rev() {
            stack.push(child);
        }
    }
    assert_eq!(forward, preorder, "chain must be a pre-order walk");

    let mut backward = vec![cur];
    while let Some(prev) = tree.prev_element(cur) {
        backward.push(prev);
        cur = prev;
    }
    backward.reverse();
    assert_eq!(forward, backward, "reverse chain must mirror the forward one");

    for &id in &forward {
        let contents = tree.contents(id);
        for (i, &child) in contents.iter().enumerate() {
            assert_eq!(tree.parent(child), Some(id), "parent link agrees");
            assert_eq!(
                tree.prev_sibling(child),
                if i > 0 { Some(contents[i - 1]) } else { None }
            );
            assert_eq!(tree.next_sibling(child), contents.get(i + 1).copied());
        }
    }
}

/// A small article page built through the HTML policy.
fn build_page() -> (Tree, NodeId) {
    let policy = TreePolicy::html();
    let mut tree = Tree::new();
    let root = tree.root();

    let html = policy.element(&mut tree, "html", []);
    tree.append(root, html).expect("append html");
    let body = policy.element(&mut tree, "body", []);
    tree.append(html, body).expect("append body");

    let article = policy.element(&mut tree, "div", [("class", "article main")]);
    tree.append(body, article).expect("append article");

    for (i, text) in ["first", "second", "third"].iter().enumerate() {
        let p = policy.element(&mut tree, "p", []);
        if i == 1 {
            tree.set_attr(p, "id", AttrValue::single("pivot"));
        }
        tree.append(article, p).expect("append p");
        let t = tree.new_text(*text);
        tree.append(p, t).expect("append text");
    }

    (tree, article)
}

#[test]
fn orderings_survive_a_mutation_storm() {
    let (mut tree, article) = build_page();
    assert_orderings_consistent(&tree);

    let ps: Vec<NodeId> = tree.find_all(article, &Strainer::tag("p"), true, None);
    assert_eq!(ps.len(), 3);

    // Move the last paragraph to the front.
    tree.insert(article, 0, ps[2]).expect("move p");
    assert_orderings_consistent(&tree);
    assert_eq!(tree.contents(article), &[ps[2], ps[0], ps[1]]);

    // Wrap the pivot paragraph, then dissolve the wrapper again.
    let wrapper = tree.new_element("section");
    tree.wrap(ps[1], wrapper).expect("wrap");
    assert_orderings_consistent(&tree);
    tree.unwrap_node(wrapper).expect("unwrap");
    assert_orderings_consistent(&tree);
    assert_eq!(tree.contents(article), &[ps[2], ps[0], ps[1]]);

    // Extract a subtree and adopt it under a different parent.
    let aside = tree.new_element("aside");
    tree.append(article, aside).expect("append aside");
    tree.extract(ps[0]);
    assert_orderings_consistent(&tree);
    tree.append(aside, ps[0]).expect("adopt");
    assert_orderings_consistent(&tree);
    assert_eq!(tree.parent(ps[0]), Some(aside));

    // Destroy the pivot entirely.
    tree.decompose(ps[1]);
    assert_orderings_consistent(&tree);
    assert!(
        tree.find(article, &Strainer::any().attr("id", Matcher::literal("pivot")))
            .is_none()
    );
}

#[test]
fn detached_subtree_stays_coherent() {
    let (mut tree, article) = build_page();
    let p = tree
        .find(article, &Strainer::tag("p"))
        .expect("should have a p");
    tree.extract(p);

    assert_eq!(tree.parent(p), None);
    assert_eq!(tree.prev_element(p), None);
    assert_eq!(tree.text(p), "first");
    // Its own descendants still walk correctly.
    assert_eq!(tree.descendants(p).count(), 1);

    // And it can join a brand-new location.
    let footer = tree.new_element("footer");
    tree.append(tree.root(), footer).expect("append footer");
    tree.append(footer, p).expect("re-adopt");
    assert_orderings_consistent(&tree);
}

#[test]
fn replace_and_render_pipeline() {
    let (mut tree, article) = build_page();
    let pivot = tree
        .select_one(article, "p#pivot")
        .expect("valid selector")
        .expect("pivot exists");

    let blockquote = tree.new_element("blockquote");
    tree.replace_with(pivot, blockquote).expect("replace");
    let quote_text = tree.new_text("quoted");
    tree.append(blockquote, quote_text).expect("append");

    let out = tree.render(article, &RenderOptions::default());
    assert_eq!(
        out,
        "<div class=\"article main\"><p>first</p><blockquote>quoted</blockquote><p>third</p></div>"
    );
    assert_orderings_consistent(&tree);
}

#[test]
fn select_after_mutation_sees_current_structure() {
    let (mut tree, article) = build_page();
    let root = tree.root();

    assert_eq!(
        tree.select(root, ".article.main > p", None)
            .expect("valid selector")
            .len(),
        3
    );

    // Strings snapshot before mutation, as iterators borrow the tree.
    let ps: Vec<NodeId> = tree.find_all(article, &Strainer::tag("p"), true, None);
    for p in ps {
        tree.set_string(p, "rewritten").expect("set_string");
    }

    let texts: Vec<NodeId> =
        tree.find_all(article, &Strainer::any().text(Matcher::literal("rewritten")), true, None);
    assert_eq!(texts.len(), 3);
    assert_eq!(
        tree.select(root, "div p + p", None).expect("valid selector").len(),
        2
    );
}

#[test]
fn policy_built_page_renders_as_xhtml() {
    let (tree, _) = build_page();
    let out = tree.render_xhtml(tree.root(), &RenderOptions::default());
    assert_eq!(
        out,
        "<html>\n<body>\n<div class=\"article main\"><p>first</p>\
         <p id=\"pivot\">second</p><p>third</p></div>\n</body>\n</html>\n"
    );
}

#[test]
fn class_queries_match_split_lists() {
    let (tree, article) = build_page();
    let root = tree.root();

    // The policy split "article main"; both single-class selectors hit.
    assert_eq!(
        tree.select(root, ".article", None).expect("valid selector"),
        vec![article]
    );
    assert_eq!(
        tree.select(root, ".main", None).expect("valid selector"),
        vec![article]
    );
    // The strainer sees the same list semantics.
    let exact = Strainer::any().attr("class", Matcher::literal("article main"));
    assert_eq!(tree.find(root, &exact), Some(article));
    let reversed = Strainer::any().attr("class", Matcher::literal("main article"));
    assert_eq!(tree.find(root, &reversed), None);
}

#[test]
fn clear_and_rebuild() {
    let (mut tree, article) = build_page();
    let before = tree.node_count();
    tree.clear(article, true);
    assert!(tree.contents(article).is_empty());
    assert_eq!(tree.node_count(), before - 6); // three p + three text nodes
    assert_orderings_consistent(&tree);

    tree.set_string(article, "fresh").expect("set_string");
    assert_eq!(tree.string(article), Some("fresh"));
    assert_orderings_consistent(&tree);
}
