use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use super::models::Category;

/// Nested view of one category, as served to clients.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryNode {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub score: i32,
    pub is_temp: bool,
    pub children: Vec<CategoryNode>,
}

/// The category forest built from one bulk load.
///
/// Nodes live in an arena indexed by position; `children` holds arena indices.
/// Parent chains that loop back on themselves are cut: the node where the
/// cycle is detected becomes a root.
#[derive(Debug, Default)]
pub struct CategoryTree {
    nodes: Vec<Category>,
    index: HashMap<Uuid, usize>,
    children: Vec<Vec<usize>>,
    parents: Vec<Option<usize>>,
    roots: Vec<usize>,
}

impl CategoryTree {
    pub fn build(mut categories: Vec<Category>) -> Self {
        categories.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        let index: HashMap<Uuid, usize> = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id, i))
            .collect();

        // Missing parents make a node a root.
        let mut parents: Vec<Option<usize>> = categories
            .iter()
            .map(|c| c.parent_id.and_then(|p| index.get(&p).copied()))
            .collect();

        // Walk each parent chain iteratively; a revisit within one walk is a cycle.
        let mut state = vec![0u8; categories.len()]; // 0 = unseen, 1 = on current walk, 2 = done
        for start in 0..categories.len() {
            let mut path = Vec::new();
            let mut current = Some(start);
            while let Some(node) = current {
                match state[node] {
                    2 => break,
                    1 => {
                        tracing::warn!(
                            category = %categories[node].name,
                            id = %categories[node].id,
                            "Category parent cycle detected, re-rooting"
                        );
                        parents[node] = None;
                        break;
                    }
                    _ => {
                        state[node] = 1;
                        path.push(node);
                        current = parents[node];
                    }
                }
            }
            for node in path {
                state[node] = 2;
            }
        }

        let mut children = vec![Vec::new(); categories.len()];
        let mut roots = Vec::new();
        for (i, parent) in parents.iter().enumerate() {
            match parent {
                Some(p) => children[*p].push(i),
                None => roots.push(i),
            }
        }

        Self {
            nodes: categories,
            index,
            children,
            parents,
            roots,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Category> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    /// Names from the root down to `id`, e.g. `["Electronics", "Phones"]`.
    pub fn path(&self, id: Uuid) -> Vec<&str> {
        let mut names = Vec::new();
        let mut current = self.index.get(&id).copied();
        while let Some(i) = current {
            names.push(self.nodes[i].name.as_str());
            current = self.parents[i];
        }
        names.reverse();
        names
    }

    pub fn full_path(&self, id: Uuid) -> String {
        self.path(id).join(" > ")
    }

    /// Owned nested forest, roots and children sorted by name.
    pub fn to_nodes(&self) -> Vec<CategoryNode> {
        // Post-order over an explicit stack so deep trees cannot overflow.
        let mut built: Vec<Option<CategoryNode>> = vec![None; self.nodes.len()];
        let mut stack: Vec<(usize, bool)> = self.roots.iter().rev().map(|&r| (r, false)).collect();

        while let Some((i, expanded)) = stack.pop() {
            if expanded {
                let children = self.children[i]
                    .iter()
                    .filter_map(|&c| built[c].take())
                    .collect();
                let category = &self.nodes[i];
                built[i] = Some(CategoryNode {
                    id: category.id,
                    name: category.name.clone(),
                    slug: category.slug.clone(),
                    score: category.score,
                    is_temp: category.is_temp,
                    children,
                });
            } else {
                stack.push((i, true));
                stack.extend(self.children[i].iter().rev().map(|&c| (c, false)));
            }
        }

        self.roots.iter().filter_map(|&r| built[r].take()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn category(name: &str, parent_id: Option<Uuid>) -> Category {
        Category {
            id: Uuid::new_v4(),
            parent_id,
            name: name.to_string(),
            slug: crate::taxonomy::normalize::slugify(name),
            score: 1,
            is_temp: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn builds_nested_forest_with_paths() {
        let electronics = category("Electronics", None);
        let phones = category("Phones", Some(electronics.id));
        let android = category("Android", Some(phones.id));
        let cars = category("Cars", None);
        let tree = CategoryTree::build(vec![android.clone(), cars, phones.clone(), electronics]);

        assert_eq!(tree.full_path(android.id), "Electronics > Phones > Android");

        let nodes = tree.to_nodes();
        let names: Vec<_> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Cars", "Electronics"]);
        assert_eq!(nodes[1].children[0].name, "Phones");
        assert_eq!(nodes[1].children[0].children[0].id, android.id);
    }

    #[test]
    fn cycles_are_broken_instead_of_looping() {
        let mut a = category("A", None);
        let b = category("B", Some(a.id));
        a.parent_id = Some(b.id);
        let tree = CategoryTree::build(vec![a.clone(), b.clone()]);

        let nodes = tree.to_nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].children.len(), 1);
        assert_eq!(tree.path(a.id).len() + tree.path(b.id).len(), 3);
    }

    #[test]
    fn orphans_become_roots() {
        let orphan = category("Orphan", Some(Uuid::new_v4()));
        let tree = CategoryTree::build(vec![orphan.clone()]);
        assert_eq!(tree.full_path(orphan.id), "Orphan");
        assert_eq!(tree.to_nodes().len(), 1);
    }

    #[test]
    fn deep_chains_do_not_recurse() {
        let mut categories = vec![category("level-0", None)];
        for depth in 1..1_000 {
            let parent = categories[depth - 1].id;
            categories.push(category(&format!("level-{depth}"), Some(parent)));
        }
        let leaf = categories[999].id;
        let tree = CategoryTree::build(categories);

        assert_eq!(tree.path(leaf).len(), 1_000);
        assert_eq!(tree.to_nodes().len(), 1);
    }
}
