use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::span::Span;

pub type NodeList = Vec<Node>;

/// A compiled template: its name and its node tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    name: String,
    nodelist: NodeList,
}

impl Template {
    #[must_use]
    pub fn new(name: impl Into<String>, nodelist: NodeList) -> Self {
        Self {
            name: name.into(),
            nodelist,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn nodelist(&self) -> &NodeList {
        &self.nodelist
    }

    /// The `{% extends %}` target, if this template extends another.
    #[must_use]
    pub fn extends(&self) -> Option<&Target> {
        self.nodelist.iter().find_map(|node| match node {
            Node::Extends { parent, .. } => Some(parent),
            _ => None,
        })
    }
}

/// Every node kind the compiler produces.
///
/// Containers expose their children through [`Node::child_nodelists`]; the
/// set is closed, so a walker that matches on it sees every nested list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Text {
        span: Span,
    },
    Variable {
        var: String,
        span: Span,
    },
    Block(Arc<BlockNode>),
    Extends {
        parent: Target,
        span: Span,
    },
    Include {
        target: Target,
        span: Span,
    },
    Ssi {
        target: Target,
        parsed: bool,
        span: Span,
    },
    RenderBlock {
        name: Target,
        nodelist: NodeList,
        span: Span,
    },
    Menu {
        tag: MenuTag,
        template: Option<String>,
        span: Span,
    },
    Tag(TagNode),
}

impl Node {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Node::Text { span }
            | Node::Variable { span, .. }
            | Node::Extends { span, .. }
            | Node::Include { span, .. }
            | Node::Ssi { span, .. }
            | Node::RenderBlock { span, .. }
            | Node::Menu { span, .. } => *span,
            Node::Block(block) => block.span,
            Node::Tag(tag) => tag.span,
        }
    }

    /// The node lists nested directly inside this node, in document order.
    #[must_use]
    pub fn child_nodelists(&self) -> Vec<&NodeList> {
        match self {
            Node::Block(block) => vec![&block.nodelist],
            Node::RenderBlock { nodelist, .. } => vec![nodelist],
            Node::Tag(tag) => tag.branches.iter().map(|b| &b.nodelist).collect(),
            Node::Text { .. }
            | Node::Variable { .. }
            | Node::Extends { .. }
            | Node::Include { .. }
            | Node::Ssi { .. }
            | Node::Menu { .. } => Vec::new(),
        }
    }
}

/// Every `{% block %}` in `nodelist`, nested ones included, in document order.
#[must_use]
pub fn collect_blocks(nodelist: &NodeList) -> Vec<Arc<BlockNode>> {
    let mut blocks = Vec::new();
    let mut stack: Vec<std::slice::Iter<'_, Node>> = vec![nodelist.iter()];

    while let Some(iter) = stack.last_mut() {
        let Some(node) = iter.next() else {
            stack.pop();
            continue;
        };
        if let Node::Block(block) = node {
            blocks.push(Arc::clone(block));
        }
        let children = node.child_nodelists();
        for child in children.into_iter().rev() {
            stack.push(child.iter());
        }
    }

    blocks
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockNode {
    pub name: String,
    pub nodelist: NodeList,
    pub span: Span,
}

/// Any other tag. Leaf tags have no branches; containers have one branch per
/// opener/intermediate tag (`if` / `elif` / `else`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagNode {
    pub name: String,
    pub bits: Vec<String>,
    pub branches: Vec<Branch>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Branch {
    pub tag: String,
    pub bits: Vec<String>,
    pub nodelist: NodeList,
}

/// A tag argument naming another template.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    /// A quoted string literal, unquoted.
    Literal(String),
    /// A variable or expression, which static analysis cannot follow.
    Dynamic(String),
}

impl Target {
    #[must_use]
    pub fn parse(bit: &str) -> Self {
        match unquote(bit) {
            Some(value) => Target::Literal(value.to_string()),
            None => Target::Dynamic(bit.to_string()),
        }
    }

    #[must_use]
    pub fn literal(&self) -> Option<&str> {
        match self {
            Target::Literal(value) => Some(value),
            Target::Dynamic(_) => None,
        }
    }
}

/// Strip matching single or double quotes from a string literal.
#[must_use]
pub fn unquote(bit: &str) -> Option<&str> {
    let bytes = bit.as_bytes();
    if bytes.len() < 2 {
        return None;
    }
    let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
    if (first == b'"' || first == b'\'') && first == last {
        Some(&bit[1..bit.len() - 1])
    } else {
        None
    }
}

/// The django CMS menu tags that render a secondary template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum MenuTag {
    ShowMenu,
    ShowMenuBelowId,
    ShowSubMenu,
    ShowBreadcrumb,
}

impl MenuTag {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "show_menu" => Some(Self::ShowMenu),
            "show_menu_below_id" => Some(Self::ShowMenuBelowId),
            "show_sub_menu" => Some(Self::ShowSubMenu),
            "show_breadcrumb" => Some(Self::ShowBreadcrumb),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ShowMenu => "show_menu",
            Self::ShowMenuBelowId => "show_menu_below_id",
            Self::ShowSubMenu => "show_sub_menu",
            Self::ShowBreadcrumb => "show_breadcrumb",
        }
    }

    /// Zero-based position of the template among the tag's arguments.
    #[must_use]
    pub fn template_position(self) -> usize {
        match self {
            Self::ShowMenu => 4,
            Self::ShowMenuBelowId => 5,
            Self::ShowSubMenu | Self::ShowBreadcrumb => 1,
        }
    }

    /// The literal template argument, given positionally or as `template="..."`.
    #[must_use]
    pub fn template_argument(self, bits: &[String]) -> Option<String> {
        let keyword = bits
            .iter()
            .find_map(|bit| bit.strip_prefix("template="));
        let positional = || {
            bits.iter()
                .take_while(|bit| !bit.contains('='))
                .nth(self.template_position())
                .map(String::as_str)
        };
        keyword
            .or_else(positional)
            .and_then(unquote)
            .map(str::to_string)
    }
}

/// How one template statically refers to another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Relation {
    Extends,
    Include,
    Ssi,
    Menu(MenuTag),
}

impl Relation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Relation::Extends => "extends",
            Relation::Include => "include",
            Relation::Ssi => "ssi",
            Relation::Menu(tag) => tag.name(),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The template a tag statically names, if it is one of the referencing tags
/// and its target is a string literal.
#[must_use]
pub fn static_reference(name: &str, bits: &[String]) -> Option<(Relation, String)> {
    let relation = match name {
        "extends" => Relation::Extends,
        "include" => Relation::Include,
        "ssi" => Relation::Ssi,
        _ => {
            let tag = MenuTag::from_name(name)?;
            return tag
                .template_argument(bits)
                .map(|template| (Relation::Menu(tag), template));
        }
    };
    let target = Target::parse(bits.first()?);
    target
        .literal()
        .map(|literal| (relation, literal.to_string()))
}
