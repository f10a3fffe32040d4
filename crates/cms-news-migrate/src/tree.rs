//! Category tree reconstruction.
//!
//! Categories arrive in pages in primary-key order, but a child can only be
//! imported once its parent has a new ID. All pages are buffered first, then
//! the tree is walked pre-order from the synthetic root with an explicit
//! stack, so arbitrarily deep trees are safe.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::category::DataCategory;
use crate::destination::DestinationWriter;
use crate::error::Result;
use crate::export::{build_record, RecordContext};
use crate::language::{FieldKind, LanguageResolver};
use crate::registry::IdRegistry;
use crate::source::{LegacyRow, SourceReader};

/// One buffered legacy category.
#[derive(Debug, Clone)]
pub struct CategoryNode {
    pub legacy_id: i64,
    pub parent_id: Option<i64>,
    pub show_order: i64,
    pub row: LegacyRow,
}

/// Counters from importing a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeImport {
    pub imported: u64,
    pub skipped: u64,
}

/// Arena of buffered categories with a parent-keyed child index.
#[derive(Debug, Default)]
pub struct CategoryTree {
    nodes: Vec<CategoryNode>,
    index: HashMap<i64, usize>,
}

impl CategoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a page of category rows. Nothing is imported yet.
    pub fn buffer_page(&mut self, rows: Vec<LegacyRow>) -> Result<()> {
        for row in rows {
            let legacy_id = row.int("categoryID")?;
            if self.index.contains_key(&legacy_id) {
                warn!("Category {} read twice, keeping the first copy", legacy_id);
                continue;
            }
            let node = CategoryNode {
                legacy_id,
                parent_id: row.opt_id("parentCategoryID"),
                show_order: row.int_or("showOrder", 0),
                row,
            };
            self.index.insert(legacy_id, self.nodes.len());
            self.nodes.push(node);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn sort_siblings(&self, siblings: &mut [usize]) {
        siblings.sort_by_key(|&i| (self.nodes[i].show_order, self.nodes[i].legacy_id));
    }

    /// Node indices in import order: parents before children, siblings by
    /// show order then legacy ID.
    ///
    /// A node whose parent was never buffered is an orphan and becomes a
    /// root. Nodes caught in a parent cycle are unreachable from any root;
    /// the first of them (by sibling order) is promoted to a root and the
    /// walk continues, so every node is visited exactly once.
    pub fn traversal_order(&self) -> Vec<usize> {
        let mut children: BTreeMap<Option<i64>, Vec<usize>> = BTreeMap::new();
        for (i, node) in self.nodes.iter().enumerate() {
            let parent = match node.parent_id {
                Some(p) if self.index.contains_key(&p) && p != node.legacy_id => Some(p),
                Some(p) => {
                    warn!(
                        "Category {} references missing parent {}, importing as root",
                        node.legacy_id, p
                    );
                    None
                }
                None => None,
            };
            children.entry(parent).or_default().push(i);
        }
        for siblings in children.values_mut() {
            self.sort_siblings(siblings);
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        let mut visited: HashSet<usize> = HashSet::with_capacity(self.nodes.len());

        let mut roots = children.get(&None).cloned().unwrap_or_default();
        loop {
            self.walk(&roots, &children, &mut visited, &mut order);
            if order.len() == self.nodes.len() {
                break;
            }

            let mut unvisited: Vec<usize> = (0..self.nodes.len())
                .filter(|i| !visited.contains(i))
                .collect();
            self.sort_siblings(&mut unvisited);
            let Some(&first) = unvisited.first() else {
                break;
            };
            warn!(
                "Category {} is part of a parent cycle, importing as root",
                self.nodes[first].legacy_id
            );
            roots = vec![first];
        }

        order
    }

    fn walk(
        &self,
        roots: &[usize],
        children: &BTreeMap<Option<i64>, Vec<usize>>,
        visited: &mut HashSet<usize>,
        order: &mut Vec<usize>,
    ) {
        let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
        while let Some(i) = stack.pop() {
            if !visited.insert(i) {
                continue;
            }
            order.push(i);
            if let Some(kids) = children.get(&Some(self.nodes[i].legacy_id)) {
                stack.extend(kids.iter().rev().filter(|k| !visited.contains(k)));
            }
        }
    }

    /// Import every buffered category, parents first.
    ///
    /// Categories already in the registry are not submitted again but their
    /// children are still visited. Localized titles and descriptions are
    /// resolved after import, since translation keys are named after the
    /// new ID. A category only enters the registry once its localized fields
    /// are written.
    pub async fn import<S, W>(
        &self,
        source: &S,
        writer: &mut W,
        registry: &mut IdRegistry,
        resolver: &LanguageResolver,
        file_system_path: &str,
    ) -> Result<TreeImport>
    where
        S: SourceReader + ?Sized,
        W: DestinationWriter + ?Sized,
    {
        let mut counts = TreeImport::default();
        let no_tags = BTreeMap::new();
        let no_categories = BTreeMap::new();

        for i in self.traversal_order() {
            let node = &self.nodes[i];
            if registry.contains(DataCategory::NewsCategory, node.legacy_id) {
                debug!("Category {} already imported, skipping", node.legacy_id);
                counts.skipped += 1;
                continue;
            }

            let record = {
                let ctx = RecordContext {
                    profile: source.profile(),
                    registry: &*registry,
                    file_system_path,
                    tags: &no_tags,
                    categories: &no_categories,
                };
                build_record(DataCategory::NewsCategory, &node.row, &ctx)?
            };

            let new_id = writer
                .import(DataCategory::NewsCategory, node.legacy_id, &record)
                .await?;

            let mut update = BTreeMap::new();
            for kind in [FieldKind::Title, FieldKind::Description] {
                let value = node.row.text(kind.column());
                let resolved = resolver.resolve(source, writer, &value, new_id, kind).await?;
                if resolved.as_str() != value {
                    update.insert(kind.column().to_string(), resolved.as_str().into());
                }
            }
            if !update.is_empty() {
                writer
                    .update(DataCategory::NewsCategory, new_id, &update)
                    .await?;
            }

            // Only fully translated categories enter the registry.
            registry.record(DataCategory::NewsCategory, node.legacy_id, new_id)?;
            counts.imported += 1;
        }

        info!(
            "Category tree: {} imported, {} already present",
            counts.imported, counts.skipped
        );
        Ok(counts)
    }
}
