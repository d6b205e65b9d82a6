//! Transitive template references of a compiled template.
//!
//! Inheritance is resolved the way Django renders it: a child's blocks
//! replace its ancestors' blocks of the same name, the replaced definitions
//! stay reachable through `{{ block.super }}`, and only the root-most
//! ancestor's content outside blocks is live.

use std::sync::Arc;

use cmst_templates::nodelist::collect_blocks;
use cmst_templates::nodelist::BlockNode;
use cmst_templates::nodelist::Target;
use cmst_templates::Node;
use cmst_templates::NodeList;
use cmst_templates::Relation;
use cmst_templates::Template;
use rustc_hash::FxHashSet;

use crate::error::AnalysisError;
use crate::loader::TemplateLoader;
use crate::reference::Reference;

/// Every template `template` statically depends on, directly or through the
/// templates it includes and extends.
///
/// Each reference names the template whose source holds the call site.
/// Duplicates are dropped, keeping the first occurrence.
pub fn extract_references(
    loader: &mut TemplateLoader<'_>,
    template: &Template,
) -> Result<Vec<Reference>, AnalysisError> {
    let mut extractor = Extractor::new(loader);
    extractor.descended.insert(template.name().to_string());
    extractor.push(template.nodelist(), template.name(), None, &FxHashSet::default());
    extractor.run()?;
    Ok(extractor.found)
}

type BlockId = usize;

/// A block definition in one inheritance chain, linked to the definition it
/// overrides.
struct ChainedBlock {
    node: Arc<BlockNode>,
    owner: String,
    parent: Option<BlockId>,
}

/// A place in a node list that leads to another template.
enum Site {
    Reference {
        callee: String,
        relation: Relation,
        follow: bool,
    },
    /// `{% extends %}`, with the blocks of the extending template.
    Extends {
        parent: String,
        blocks: Vec<Arc<BlockNode>>,
    },
    /// `{{ block.super }}` directly inside the block being rendered.
    Super,
}

/// A node list waiting to be walked.
struct Frame {
    sites: std::vec::IntoIter<Site>,
    caller: String,
    current: Option<BlockId>,
}

struct Extractor<'l, 's> {
    loader: &'l mut TemplateLoader<'s>,
    found: Vec<Reference>,
    seen: FxHashSet<Reference>,
    blocks: Vec<ChainedBlock>,
    stack: Vec<Frame>,
    /// Templates whose content has been queued with no block context.
    descended: FxHashSet<String>,
    /// Overridden blocks already queued through `{{ block.super }}`.
    supered: FxHashSet<BlockId>,
}

impl<'l, 's> Extractor<'l, 's> {
    fn new(loader: &'l mut TemplateLoader<'s>) -> Self {
        Self {
            loader,
            found: Vec::new(),
            seen: FxHashSet::default(),
            blocks: Vec::new(),
            stack: Vec::new(),
            descended: FxHashSet::default(),
            supered: FxHashSet::default(),
        }
    }

    fn record(&mut self, callee: &str, relation: Relation, caller: &str) {
        let reference = Reference::new(callee, relation, caller);
        if self.seen.insert(reference.clone()) {
            tracing::trace!(%reference, "found reference");
            self.found.push(reference);
        }
    }

    fn push(
        &mut self,
        nodelist: &NodeList,
        caller: &str,
        current: Option<BlockId>,
        skip: &FxHashSet<String>,
    ) {
        self.stack.push(Frame {
            sites: reference_sites(nodelist, skip).into_iter(),
            caller: caller.to_string(),
            current,
        });
    }

    /// Walk queued node lists depth first, so references come out in
    /// document order.
    fn run(&mut self) -> Result<(), AnalysisError> {
        while let Some(frame) = self.stack.last_mut() {
            let Some(site) = frame.sites.next() else {
                self.stack.pop();
                continue;
            };
            let caller = frame.caller.clone();
            let current = frame.current;

            match site {
                Site::Reference {
                    callee,
                    relation,
                    follow,
                } => {
                    self.record(&callee, relation, &caller);
                    if follow {
                        self.descend(&callee)?;
                    }
                }
                Site::Extends { parent, blocks } => {
                    self.record(&parent, Relation::Extends, &caller);
                    self.extend(blocks, &caller, &parent)?;
                }
                Site::Super => {
                    let parent = current.and_then(|id| self.blocks[id].parent);
                    if let Some(parent) = parent.filter(|parent| self.supered.insert(*parent)) {
                        let node = Arc::clone(&self.blocks[parent].node);
                        let owner = self.blocks[parent].owner.clone();
                        self.push(&node.nodelist, &owner, Some(parent), &FxHashSet::default());
                    }
                }
            }
        }
        Ok(())
    }

    /// Queue an included or menu template unless it has been queued before.
    ///
    /// Such a template is always walked with no block context, so a second
    /// walk could only find references already recorded.
    fn descend(&mut self, name: &str) -> Result<(), AnalysisError> {
        if !self.descended.insert(name.to_string()) {
            return Ok(());
        }
        let template = self.loader.load(name)?;
        self.push(template.nodelist(), name, None, &FxHashSet::default());
        Ok(())
    }

    /// Resolve the inheritance chain above `child` and queue what renders.
    fn extend(
        &mut self,
        child_blocks: Vec<Arc<BlockNode>>,
        child: &str,
        parent: &str,
    ) -> Result<(), AnalysisError> {
        let mut chain: Vec<(String, BlockId)> = Vec::new();
        for node in child_blocks {
            let id = self.push_block(node, child);
            chain.push((child.to_string(), id));
        }
        let mut names: Vec<String> = chain
            .iter()
            .map(|(_, id)| self.blocks[*id].node.name.clone())
            .collect();

        let mut ancestors = vec![child.to_string()];
        let mut root: Option<Arc<Template>> = None;
        let mut next = parent.to_string();

        while !ancestors.contains(&next) {
            let ancestor = self.loader.load(&next)?;
            ancestors.push(next.clone());

            for node in collect_blocks(ancestor.nodelist()) {
                match names.iter().position(|name| *name == node.name) {
                    None => {
                        names.push(node.name.clone());
                        let id = self.push_block(node, ancestor.name());
                        chain.push((ancestor.name().to_string(), id));
                    }
                    Some(index) => {
                        let tail = self.chain_tail(chain[index].1);
                        let id = self.push_block(node, ancestor.name());
                        self.blocks[tail].parent = Some(id);
                    }
                }
            }

            let grandparent = match ancestor.extends() {
                Some(Target::Literal(grandparent)) => Some(grandparent.clone()),
                Some(Target::Dynamic(_)) | None => None,
            };
            let Some(grandparent) = grandparent else {
                root = Some(ancestor);
                break;
            };
            self.record(&grandparent, Relation::Extends, ancestor.name());
            next = grandparent;
        }

        // the stack is LIFO: queue the root content first so it is walked last
        let skip: FxHashSet<String> = names.into_iter().collect();
        if let Some(root) = root {
            self.push(root.nodelist(), root.name(), None, &skip);
        }
        for (owner, id) in chain.into_iter().rev() {
            let node = Arc::clone(&self.blocks[id].node);
            self.push(&node.nodelist, &owner, Some(id), &skip);
        }
        Ok(())
    }

    fn push_block(&mut self, node: Arc<BlockNode>, owner: &str) -> BlockId {
        self.blocks.push(ChainedBlock {
            node,
            owner: owner.to_string(),
            parent: None,
        });
        self.blocks.len() - 1
    }

    /// The last definition in a block's override chain.
    fn chain_tail(&self, id: BlockId) -> BlockId {
        let mut seen = FxHashSet::default();
        let mut tail = id;
        while let Some(parent) = self.blocks[tail].parent {
            if !seen.insert(parent) {
                break;
            }
            tail = parent;
        }
        tail
    }
}

/// The sites of `nodelist` that lead to other templates, in document order.
///
/// Blocks named in `skip` are overridden further down the chain and left
/// out. Nothing after `{% extends %}` renders except through blocks, so the
/// walk stops there.
fn reference_sites(nodelist: &NodeList, skip: &FxHashSet<String>) -> Vec<Site> {
    let mut sites = Vec::new();
    // `live` is false inside nested blocks, where `block.super` belongs to
    // another block
    let mut stack: Vec<(std::slice::Iter<'_, Node>, bool)> = vec![(nodelist.iter(), true)];

    while let Some((iter, live)) = stack.last_mut() {
        let live = *live;
        let Some(node) = iter.next() else {
            stack.pop();
            continue;
        };
        match node {
            Node::Include {
                target: Target::Literal(name),
                ..
            } => sites.push(Site::Reference {
                callee: name.clone(),
                relation: Relation::Include,
                follow: true,
            }),
            Node::Ssi {
                target: Target::Literal(name),
                parsed,
                ..
            } => sites.push(Site::Reference {
                callee: name.clone(),
                relation: Relation::Ssi,
                follow: *parsed,
            }),
            Node::Extends {
                parent: Target::Literal(parent),
                ..
            } => {
                sites.push(Site::Extends {
                    parent: parent.clone(),
                    blocks: collect_blocks(nodelist),
                });
                break;
            }
            Node::Menu {
                tag,
                template: Some(name),
                ..
            } => sites.push(Site::Reference {
                callee: name.clone(),
                relation: Relation::Menu(*tag),
                follow: true,
            }),
            Node::RenderBlock { nodelist, .. } => stack.push((nodelist.iter(), false)),
            Node::Variable { var, .. } if live && var == "block.super" => sites.push(Site::Super),
            Node::Block(block) if skip.contains(&block.name) => {}
            Node::Block(block) => stack.push((block.nodelist.iter(), false)),
            other => {
                let children = other.child_nodelists();
                for child in children.into_iter().rev() {
                    stack.push((child.iter(), live));
                }
            }
        }
    }

    sites
}

#[cfg(test)]
mod tests {
    use cmst_templates::CompileOptions;
    use cmst_templates::TagSpecs;

    use super::*;
    use crate::store::MemoryStore;

    fn extract(store: &MemoryStore, name: &str) -> Result<Vec<Reference>, AnalysisError> {
        let specs = TagSpecs::builtins().unwrap();
        let mut loader = TemplateLoader::new(store, &specs, CompileOptions::default());
        let template = loader.load(name)?;
        extract_references(&mut loader, &template)
    }

    fn render(store: &MemoryStore, name: &str) -> String {
        extract(store, name)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn callees(store: &MemoryStore, name: &str) -> Vec<String> {
        extract(store, name)
            .unwrap()
            .into_iter()
            .map(|reference| reference.callee)
            .collect()
    }

    mod includes {
        use super::*;

        #[test]
        fn test_constant_include_is_followed() {
            let store = MemoryStore::new()
                .with("page.html", "{% include 'a.html' %}")
                .with("a.html", "{% include 'b.html' %}")
                .with("b.html", "leaf");
            insta::assert_snapshot!(render(&store, "page.html"), @r"
            page.html -> a.html (include)
            a.html -> b.html (include)
            ");
        }

        #[test]
        fn test_dynamic_include_is_skipped() {
            let store = MemoryStore::new().with("page.html", "{% extends parent %}{% include name %}");
            assert!(extract(&store, "page.html").unwrap().is_empty());
        }

        #[test]
        fn test_include_inside_containers() {
            let store = MemoryStore::new()
                .with(
                    "page.html",
                    "{% if x %}{% for i in y %}{% include 'a.html' %}{% endfor %}{% else %}{% with z=1 %}{% include 'b.html' %}{% endwith %}{% endif %}",
                )
                .with("a.html", "")
                .with("b.html", "");
            assert_eq!(callees(&store, "page.html"), vec!["a.html", "b.html"]);
        }

        #[test]
        fn test_ssi_only_descends_when_parsed() {
            let store = MemoryStore::new()
                .with("page.html", "{% ssi 'raw.html' %}{% ssi 'parsed.html' parsed %}")
                .with("parsed.html", "{% include 'inner.html' %}")
                .with("inner.html", "");
            assert_eq!(
                callees(&store, "page.html"),
                vec!["raw.html", "parsed.html", "inner.html"]
            );
        }

        #[test]
        fn test_menu_templates_are_followed() {
            let store = MemoryStore::new()
                .with(
                    "page.html",
                    "{% load menu_tags %}{% show_menu 0 100 100 100 'menu.html' %}{% show_breadcrumb 0 'crumbs.html' %}",
                )
                .with("menu.html", "{% show_menu_below_id 'root' 0 100 100 100 'menu.html' %}")
                .with("crumbs.html", "");
            insta::assert_snapshot!(render(&store, "page.html"), @r"
            page.html -> menu.html (show_menu)
            menu.html -> menu.html (show_menu_below_id)
            page.html -> crumbs.html (show_breadcrumb)
            ");
        }

        #[test]
        fn test_render_block_content_is_scanned() {
            let store = MemoryStore::new()
                .with(
                    "base.html",
                    "<head>{% render_block 'css' %}</head>{% include 'body.html' %}",
                )
                .with("body.html", "");
            assert_eq!(callees(&store, "base.html"), vec!["body.html"]);
        }

        #[test]
        fn test_duplicates_are_dropped() {
            let store = MemoryStore::new()
                .with("page.html", "{% include 'a.html' %}{% include 'a.html' %}")
                .with("a.html", "");
            assert_eq!(callees(&store, "page.html"), vec!["a.html"]);
        }

        #[test]
        fn test_comment_is_not_scanned() {
            let store = MemoryStore::new()
                .with("page.html", "{% comment %}{% include 'gone.html' %}{% endcomment %}");
            assert!(extract(&store, "page.html").unwrap().is_empty());
        }
    }

    mod inheritance {
        use super::*;

        fn parent_and_child(child_block: &str) -> MemoryStore {
            MemoryStore::new()
                .with(
                    "P",
                    "<html>{% block content %}{% include 'X' %}{% endblock %}</html>",
                )
                .with(
                    "C",
                    format!("{{% extends 'P' %}}{{% block content %}}{child_block}{{% endblock %}}"),
                )
                .with("X", "")
                .with("Y", "")
                .with("Z", "")
        }

        #[test]
        fn test_block_override_suppresses_parent_content() {
            let store = parent_and_child("{% include 'Y' %}");
            assert_eq!(callees(&store, "C"), vec!["P", "Y"]);
        }

        #[test]
        fn test_block_super_pulls_parent_content_back() {
            let store = parent_and_child("{{ block.super }}{% include 'Z' %}");
            insta::assert_snapshot!(render(&store, "C"), @r"
            C -> P (extends)
            P -> X (include)
            C -> Z (include)
            ");
        }

        #[test]
        fn test_block_super_with_filter() {
            let store = parent_and_child("{{ block.super|safe }}");
            assert_eq!(callees(&store, "C"), vec!["P", "X"]);
        }

        #[test]
        fn test_parent_content_outside_blocks_is_live() {
            let store = MemoryStore::new()
                .with("base.html", "{% include 'nav.html' %}{% block main %}{% endblock %}")
                .with("page.html", "{% extends 'base.html' %}{% block main %}hi{% endblock %}")
                .with("nav.html", "");
            assert_eq!(callees(&store, "page.html"), vec!["base.html", "nav.html"]);
        }

        #[test]
        fn test_child_content_outside_blocks_is_dead() {
            let store = MemoryStore::new()
                .with("base.html", "")
                .with("page.html", "{% extends 'base.html' %}{% include 'never.html' %}");
            assert_eq!(callees(&store, "page.html"), vec!["base.html"]);
        }

        #[test]
        fn test_new_ancestor_blocks_are_scanned() {
            let store = MemoryStore::new()
                .with(
                    "base.html",
                    "{% block head %}{% include 'head.html' %}{% endblock %}{% block body %}{% endblock %}",
                )
                .with("page.html", "{% extends 'base.html' %}{% block body %}x{% endblock %}")
                .with("head.html", "");
            assert_eq!(callees(&store, "page.html"), vec!["base.html", "head.html"]);
        }

        #[test]
        fn test_three_level_super_chain() {
            let store = MemoryStore::new()
                .with(
                    "root.html",
                    "{% block content %}{% include 'from_root.html' %}{% endblock %}",
                )
                .with(
                    "middle.html",
                    "{% extends 'root.html' %}{% block content %}{{ block.super }}{% include 'from_middle.html' %}{% endblock %}",
                )
                .with(
                    "leaf.html",
                    "{% extends 'middle.html' %}{% block content %}{{ block.super }}{% endblock %}",
                )
                .with("from_root.html", "")
                .with("from_middle.html", "");
            insta::assert_snapshot!(render(&store, "leaf.html"), @r"
            leaf.html -> middle.html (extends)
            middle.html -> root.html (extends)
            root.html -> from_root.html (include)
            middle.html -> from_middle.html (include)
            ");
        }

        #[test]
        fn test_middle_override_hides_root_content() {
            let store = MemoryStore::new()
                .with(
                    "root.html",
                    "{% block content %}{% include 'from_root.html' %}{% endblock %}",
                )
                .with(
                    "middle.html",
                    "{% extends 'root.html' %}{% block content %}{% include 'from_middle.html' %}{% endblock %}",
                )
                .with("leaf.html", "{% extends 'middle.html' %}")
                .with("from_root.html", "")
                .with("from_middle.html", "");
            assert_eq!(
                callees(&store, "leaf.html"),
                vec!["middle.html", "root.html", "from_middle.html"]
            );
        }

        #[test]
        fn test_nested_blocks_scanned_once() {
            let store = MemoryStore::new()
                .with(
                    "base.html",
                    "{% block outer %}{% if x %}{% block inner %}{% include 'a.html' %}{% endblock %}{% endif %}{% endblock %}",
                )
                .with("page.html", "{% extends 'base.html' %}{% block inner %}{% include 'b.html' %}{% endblock %}")
                .with("a.html", "")
                .with("b.html", "");
            assert_eq!(callees(&store, "page.html"), vec!["base.html", "b.html"]);
        }
        #[test]
        fn test_shared_base_through_include() {
            let store = MemoryStore::new()
                .with("base.html", "{% block content %}{% include 'X' %}{% endblock %}")
                .with(
                    "widget.html",
                    "{% extends 'base.html' %}{% block other %}{% endblock %}",
                )
                .with(
                    "page.html",
                    "{% extends 'base.html' %}{% block content %}{% include 'widget.html' %}{% endblock %}",
                )
                .with("X", "");
            insta::assert_snapshot!(render(&store, "page.html"), @r"
            page.html -> base.html (extends)
            page.html -> widget.html (include)
            widget.html -> base.html (extends)
            base.html -> X (include)
            ");
        }

        #[test]
        fn test_repeated_block_super() {
            let store = parent_and_child("{{ block.super }}{{ block.super }}{% include 'Y' %}");
            assert_eq!(callees(&store, "C"), vec!["P", "X", "Y"]);
        }
    }

    mod long_chains {
        use super::*;

        fn chain(depth: usize, body: impl Fn(usize) -> String) -> MemoryStore {
            (0..depth).fold(MemoryStore::new().with(format!("t{depth}"), ""), |store, i| {
                store.with(format!("t{i}"), body(i + 1))
            })
        }

        #[test]
        fn test_doubled_includes_are_walked_once() {
            let store = chain(40, |next| {
                format!("{{% include 't{next}' %}}{{% include 't{next}' %}}")
            });
            let references = extract(&store, "t0").unwrap();
            assert_eq!(references.len(), 40);
            assert_eq!(references[39].to_string(), "t39 -> t40 (include)");
        }

        #[test]
        fn test_deep_include_chain_does_not_overflow() {
            let store = chain(5_000, |next| format!("{{% include 't{next}' %}}"));
            let references = extract(&store, "t0").unwrap();
            assert_eq!(references.len(), 5_000);
            assert_eq!(references[4_999].to_string(), "t4999 -> t5000 (include)");
        }

        #[test]
        fn test_deep_super_chain_does_not_overflow() {
            let store = chain(1_000, |next| {
                format!("{{% extends 't{next}' %}}{{% block b %}}{{{{ block.super }}}}{{% endblock %}}")
            })
            .with("t1000", "{% block b %}{% include 'leaf' %}{% endblock %}")
            .with("leaf", "");
            let references = extract(&store, "t0").unwrap();
            assert_eq!(references.len(), 1_001);
            assert_eq!(references[1_000].to_string(), "t1000 -> leaf (include)");
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn test_missing_include_is_reported() {
            let store = MemoryStore::new().with("page.html", "{% include 'ghost.html' %}");
            assert!(matches!(
                extract(&store, "page.html"),
                Err(AnalysisError::TemplateNotFound { name }) if name == "ghost.html"
            ));
        }

        #[test]
        fn test_syntax_error_in_dependency() {
            let store = MemoryStore::new()
                .with("page.html", "{% include 'broken.html' %}")
                .with("broken.html", "{% block a %}");
            assert!(matches!(
                extract(&store, "page.html"),
                Err(AnalysisError::Syntax { template, .. }) if template == "broken.html"
            ));
        }

        #[test]
        fn test_cyclic_input_terminates() {
            let store = MemoryStore::new()
                .with("a.html", "{% include 'b.html' %}")
                .with("b.html", "{% include 'a.html' %}")
                .with("c.html", "{% extends 'd.html' %}")
                .with("d.html", "{% extends 'c.html' %}");
            assert_eq!(callees(&store, "a.html"), vec!["b.html", "a.html"]);
            assert_eq!(callees(&store, "c.html"), vec!["d.html", "c.html"]);
        }
    }
}
