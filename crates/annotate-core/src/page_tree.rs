use serde::{Deserialize, Serialize};

/// A node of the knowledge-base page tree. Read-only input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTreeNode {
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub children: Vec<PageTreeNode>,
}

/// One entry of the page picker, with its nesting depth for indentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatPage {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub icon: Option<String>,
    pub depth: usize,
}

/// Pre-order flattening of the tree.
pub fn flatten_pages(tree: &[PageTreeNode]) -> Vec<FlatPage> {
    fn walk(nodes: &[PageTreeNode], depth: usize, out: &mut Vec<FlatPage>) {
        for node in nodes {
            out.push(FlatPage {
                id: node.id.clone(),
                title: node.title.clone(),
                slug: node.slug.clone(),
                icon: node.icon.clone(),
                depth,
            });
            walk(&node.children, depth + 1, out);
        }
    }

    let mut out = Vec::new();
    walk(tree, 0, &mut out);
    out
}

/// Keeps pages whose title or slug contains `query`, ignoring case.
pub fn filter_pages(pages: &[FlatPage], query: &str) -> Vec<FlatPage> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return pages.to_vec();
    }
    pages
        .iter()
        .filter(|page| {
            page.title.to_lowercase().contains(&query) || page.slug.to_lowercase().contains(&query)
        })
        .cloned()
        .collect()
}

pub fn find_page<'a>(pages: &'a [FlatPage], id: &str) -> Option<&'a FlatPage> {
    pages.iter().find(|page| page.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, title: &str, children: Vec<PageTreeNode>) -> PageTreeNode {
        PageTreeNode {
            id: id.to_string(),
            title: title.to_string(),
            slug: title.to_lowercase().replace(' ', "-"),
            icon: None,
            children,
        }
    }

    #[test]
    fn flatten_is_preorder_with_depth() {
        let tree = vec![
            node(
                "1",
                "Guides",
                vec![node("2", "Refunds", vec![node("3", "Card Refunds", vec![])])],
            ),
            node("4", "Policies", vec![]),
        ];
        let flat = flatten_pages(&tree);
        let summary: Vec<_> = flat.iter().map(|p| (p.id.as_str(), p.depth)).collect();
        assert_eq!(summary, vec![("1", 0), ("2", 1), ("3", 2), ("4", 0)]);
    }

    #[test]
    fn filter_matches_title_or_slug_case_insensitively() {
        let flat = flatten_pages(&[
            node("1", "Card Refunds", vec![]),
            node("2", "Policies", vec![]),
        ]);
        let hits = filter_pages(&flat, "  REFUND ");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "1");
        assert_eq!(filter_pages(&flat, "card-ref").len(), 1);
        assert_eq!(filter_pages(&flat, "").len(), 2);
        assert!(find_page(&flat, "2").is_some());
    }
}
