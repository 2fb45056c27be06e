//! Balancing long child lists into trees of bounded width.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::node_type::NodeType;
use super::tree::{Child, Tree};

/// Target branching factor of balanced trees.
pub(crate) const BRANCH_FACTOR: usize = 8;

/// Constructor for the nodes produced while balancing.
pub(crate) type MakeTree<'f> = dyn Fn(Vec<Child>, Vec<u32>, usize) -> Arc<Tree> + 'f;

/// Group `children[from..to]` into a tree whose nodes have roughly
/// [`BRANCH_FACTOR`] children. `mk_top` builds the root, `mk_tree` the
/// intermediate nodes.
#[allow(clippy::too_many_arguments)]
pub(crate) fn balance_range(
    balance_type: &NodeType,
    children: &[Child],
    positions: &[u32],
    from: usize,
    to: usize,
    start: usize,
    length: usize,
    mk_top: Option<&MakeTree<'_>>,
    mk_tree: &MakeTree<'_>,
) -> Arc<Tree> {
    let mut balancer = Balancer {
        balance_type,
        mk_tree,
        sizes: FxHashMap::default(),
    };
    balancer.balance_range(children, positions, from, to, start, length, mk_top)
}

struct Balancer<'a, 'f> {
    balance_type: &'a NodeType,
    mk_tree: &'a MakeTree<'f>,
    /// Node sizes of already-measured trees, keyed by address.
    sizes: FxHashMap<usize, usize>,
}

impl Balancer<'_, '_> {
    /// Number of balance-type nodes that `node` contributes, counting nested
    /// anonymous repetitions of the same type as one level.
    fn node_size(&mut self, node: &Child) -> usize {
        let tree = match node {
            Child::Tree(tree)
                if self.balance_type.is_anonymous() && tree.node_type() == self.balance_type =>
            {
                tree
            }
            _ => return 1,
        };
        let key = Arc::as_ptr(tree) as usize;
        if let Some(&size) = self.sizes.get(&key) {
            return size;
        }
        let mut size = 1;
        for child in tree.children() {
            let nested = match child {
                Child::Tree(inner) if inner.node_type() == self.balance_type => child,
                _ => {
                    size = 1;
                    break;
                }
            };
            size += self.node_size(nested);
        }
        self.sizes.insert(key, size);
        size
    }

    #[allow(clippy::too_many_arguments)]
    fn balance_range(
        &mut self,
        children: &[Child],
        positions: &[u32],
        from: usize,
        to: usize,
        start: usize,
        length: usize,
        mk_top: Option<&MakeTree<'_>>,
    ) -> Arc<Tree> {
        let total: usize = children[from..to].iter().map(|c| self.node_size(c)).sum();
        let max_child = (total as f64 * 1.5 / BRANCH_FACTOR as f64).ceil() as usize;
        let mut local_children = Vec::new();
        let mut local_positions = Vec::new();
        self.divide(
            children,
            positions,
            from,
            to,
            0,
            start,
            max_child,
            &mut local_children,
            &mut local_positions,
        );
        match mk_top {
            Some(mk) => mk(local_children, local_positions, length),
            None => (self.mk_tree)(local_children, local_positions, length),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn divide(
        &mut self,
        children: &[Child],
        positions: &[u32],
        from: usize,
        to: usize,
        offset: usize,
        start: usize,
        max_child: usize,
        out_children: &mut Vec<Child>,
        out_positions: &mut Vec<u32>,
    ) {
        let mut i = from;
        while i < to {
            let group_from = i;
            let group_start = positions[i] as usize;
            let mut group_size = self.node_size(&children[i]);
            i += 1;
            while i < to {
                let next_size = self.node_size(&children[i]);
                if group_size + next_size >= max_child {
                    break;
                }
                group_size += next_size;
                i += 1;
            }
            if i == group_from + 1 {
                if group_size > max_child {
                    if let Child::Tree(only) = &children[group_from] {
                        let only = only.clone();
                        self.divide(
                            only.children(),
                            only.positions(),
                            0,
                            only.children().len(),
                            positions[group_from] as usize + offset,
                            start,
                            max_child,
                            out_children,
                            out_positions,
                        );
                        continue;
                    }
                }
                out_children.push(children[group_from].clone());
            } else {
                let length = positions[i - 1] as usize + children[i - 1].len() - group_start;
                let grouped =
                    self.balance_range(children, positions, group_from, i, group_start, length, None);
                out_children.push(Child::Tree(grouped));
            }
            out_positions.push((group_start + offset).saturating_sub(start) as u32);
        }
    }
}
