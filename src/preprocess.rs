// Boilerplate pruning ahead of text collection.

use std::sync::LazyLock;

use ego_tree::NodeId;
use regex::Regex;
use scraper::node::Element;
use scraper::Html;

/// Tags removed with their whole subtree: links and scripts.
const PRUNE_TAGS: &[&str] = &["a", "script"];

/// Class token pattern for cookie banners ("cookie", "cookies", "cookie-bar", "cooki_x", ...).
static COOKIE_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new("cookie*.").unwrap());

/// Return a copy of `doc` with link, script and cookie-banner subtrees detached.
///
/// Detached nodes stay in the arena, so callers must walk from the root
/// (`root_element().select`, `tree.root()`) rather than `Html::select`, which
/// scans every node. The input document is left untouched.
pub(crate) fn strip_boilerplate(doc: &Html) -> Html {
    let pruned_ids: Vec<NodeId> = doc
        .tree
        .root()
        .descendants()
        .filter(|node| node.value().as_element().is_some_and(is_pruned))
        .map(|node| node.id())
        .collect();

    let mut pruned = doc.clone();
    for id in pruned_ids {
        if let Some(mut node) = pruned.tree.get_mut(id) {
            node.detach();
        }
    }
    pruned
}

fn is_pruned(el: &Element) -> bool {
    PRUNE_TAGS.contains(&el.name()) || el.classes().any(|c| COOKIE_CLASS_RE.is_match(c))
}
