//! Page-tree discovery: flatten a space's page hierarchy into id → title.
//!
//! The hierarchy is discarded on purpose; the pipeline only needs the set of
//! pages to export, not their nesting.

use std::collections::BTreeMap;

use tracing::debug;

use crate::contract::{ConfluenceApi, PageId};
use crate::error::ApiError;

/// Flat mapping of every page reachable below a root, excluding the root
/// itself. Keys are unique; revisiting an id is an idempotent merge.
pub type PageTree = BTreeMap<PageId, String>;

/// Walk the hierarchy below `root` with an explicit worklist.
///
/// The result map doubles as the visited set: an id that was already
/// recorded is never pushed again, so traversal terminates even if the
/// remote data were to alias a page twice. `root` itself is never a key.
pub async fn discover<A>(api: &A, root: &PageId) -> Result<PageTree, ApiError>
where
    A: ConfluenceApi + ?Sized,
{
    let mut pages = PageTree::new();
    let mut stack = vec![root.clone()];

    while let Some(parent) = stack.pop() {
        for (id, title) in api.list_children(&parent).await? {
            if id == *root {
                continue;
            }
            if pages.insert(id.clone(), title).is_none() {
                stack.push(id);
            }
        }
    }

    debug!(root = %root, pages = pages.len(), "Discovered page tree");
    Ok(pages)
}
