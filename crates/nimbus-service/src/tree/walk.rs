//! Iterative subtree traversal.
//!
//! Trees can be arbitrarily deep or wide, so walks use an explicit frontier
//! instead of recursion and suspend on each store read.

use std::collections::HashSet;

use uuid::Uuid;

use nimbus_core::result::AppResult;
use nimbus_database::{Liveness, NodeStore};
use nimbus_entity::node::Node;

/// Collect `root` and its descendants in the given state, pre-order.
///
/// Every node appears after its parent, so the reversed list visits
/// children before parents. Only folders in the requested state are
/// descended into.
pub async fn collect_subtree(
    nodes: &dyn NodeStore,
    root: Node,
    liveness: Liveness,
) -> AppResult<Vec<Node>> {
    let mut ordered = Vec::new();
    let mut seen = HashSet::new();
    let mut frontier = vec![root];

    while let Some(node) = frontier.pop() {
        if !seen.insert(node.id) {
            continue;
        }
        if node.is_folder {
            let mut children = nodes.list_children(node.id, liveness).await?;
            // Reverse so the stack pops children in listing order.
            children.reverse();
            frontier.extend(children);
        }
        ordered.push(node);
    }
    Ok(ordered)
}

/// Whether `candidate` lies strictly below `ancestor_id`, following parent
/// links upward from the candidate.
pub async fn is_descendant(
    nodes: &dyn NodeStore,
    ancestor_id: Uuid,
    candidate: Uuid,
) -> AppResult<bool> {
    let mut seen = HashSet::new();
    let mut cursor = nodes.find_by_id(candidate).await?.and_then(|n| n.parent_id);

    while let Some(id) = cursor {
        if id == ancestor_id {
            return Ok(true);
        }
        if !seen.insert(id) {
            break;
        }
        cursor = nodes.find_by_id(id).await?.and_then(|n| n.parent_id);
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_database::MemoryStore;
    use nimbus_entity::node::NewNode;

    async fn folder(store: &MemoryStore, owner: Uuid, parent: Option<Uuid>, name: &str) -> Node {
        NodeStore::insert(store, &NewNode::folder(owner, parent, name))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_pre_order_lists_parents_first() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let a = folder(&store, owner, None, "A").await;
        let b = folder(&store, owner, Some(a.id), "B").await;
        let c = folder(&store, owner, Some(b.id), "C").await;
        let d = folder(&store, owner, Some(a.id), "D").await;

        let order: Vec<Uuid> = collect_subtree(&store, a.clone(), Liveness::Live)
            .await
            .unwrap()
            .iter()
            .map(|n| n.id)
            .collect();

        assert_eq!(order.len(), 4);
        assert_eq!(order[0], a.id);
        let pos = |id: Uuid| order.iter().position(|x| *x == id).unwrap();
        assert!(pos(b.id) < pos(c.id));
        assert!(pos(a.id) < pos(d.id));
    }

    #[tokio::test]
    async fn test_is_descendant_at_any_depth() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let a = folder(&store, owner, None, "A").await;
        let b = folder(&store, owner, Some(a.id), "B").await;
        let c = folder(&store, owner, Some(b.id), "C").await;
        let other = folder(&store, owner, None, "Other").await;

        assert!(is_descendant(&store, a.id, b.id).await.unwrap());
        assert!(is_descendant(&store, a.id, c.id).await.unwrap());
        assert!(!is_descendant(&store, a.id, a.id).await.unwrap());
        assert!(!is_descendant(&store, a.id, other.id).await.unwrap());
        assert!(!is_descendant(&store, c.id, a.id).await.unwrap());
    }
}
