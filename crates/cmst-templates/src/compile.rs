use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Location;
use crate::error::SyntaxError;
use crate::error::SyntaxErrorKind;
use crate::lexer::Lexer;
use crate::nodelist::BlockNode;
use crate::nodelist::Branch;
use crate::nodelist::MenuTag;
use crate::nodelist::Node;
use crate::nodelist::NodeList;
use crate::nodelist::TagNode;
use crate::nodelist::Target;
use crate::nodelist::Template;
use crate::parser::Parser;
use crate::parser::RawNode;
use crate::span::LineOffsets;
use crate::span::Span;
use crate::tagspecs::TagSpec;
use crate::tagspecs::TagSpecs;

/// Per-call compiler switches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Attach line, column and source line to syntax errors.
    pub diagnostics: bool,
}

/// Compile template source into a node tree.
pub fn compile(
    name: &str,
    source: &str,
    options: CompileOptions,
    specs: &TagSpecs,
) -> Result<Template, SyntaxError> {
    let (tokens, line_offsets) = Lexer::new(source).tokenize();
    let (nodes, errors) = Parser::new(tokens).parse();

    let result = match errors.into_iter().next() {
        Some(error) => Err(SyntaxError::from(error)),
        None => TreeBuilder::new(specs).build(nodes),
    };

    result
        .map(|nodelist| Template::new(name, nodelist))
        .map_err(|error| locate(error, options, source, &line_offsets))
}

fn locate(
    mut error: SyntaxError,
    options: CompileOptions,
    source: &str,
    line_offsets: &LineOffsets,
) -> SyntaxError {
    if options.diagnostics {
        let (line, column) = line_offsets.position(error.span.start);
        error.location = Some(Location {
            line,
            column,
            source_line: line_offsets.line_text(source, error.span.start).to_string(),
        });
    }
    error
}

enum Opener {
    Root,
    Block { name: String },
    RenderBlock { name: Target },
    Tag { name: String, spec: TagSpec },
}

struct Frame {
    opener: Opener,
    span: Span,
    bits: Vec<String>,
    branches: Vec<Branch>,
    branch_tag: String,
    branch_bits: Vec<String>,
    nodelist: NodeList,
    contains_nontext: bool,
}

impl Frame {
    fn new(opener: Opener, name: &str, bits: Vec<String>, span: Span) -> Self {
        Self {
            opener,
            span,
            branch_tag: name.to_string(),
            branch_bits: bits.clone(),
            bits,
            branches: Vec::new(),
            nodelist: Vec::new(),
            contains_nontext: false,
        }
    }

    fn end_tag(&self) -> Option<&str> {
        match &self.opener {
            Opener::Block { .. } => Some("endblock"),
            Opener::Tag { spec, .. } => spec.end.as_deref(),
            Opener::Root | Opener::RenderBlock { .. } => None,
        }
    }

    fn is_intermediate(&self, name: &str) -> bool {
        match &self.opener {
            Opener::Tag { spec, .. } => spec.intermediates.iter().any(|i| i == name),
            _ => false,
        }
    }

    fn expected(&self) -> Vec<String> {
        match &self.opener {
            Opener::Tag { spec, .. } => spec.expected(),
            Opener::Block { .. } => vec!["endblock".to_string()],
            Opener::Root | Opener::RenderBlock { .. } => Vec::new(),
        }
    }

    fn tag_name(&self) -> &str {
        match &self.opener {
            Opener::Block { .. } => "block",
            Opener::RenderBlock { .. } => "render_block",
            Opener::Tag { name, .. } => name,
            Opener::Root => "",
        }
    }

    fn into_node(mut self) -> Node {
        match self.opener {
            Opener::Block { name } => Node::Block(Arc::new(BlockNode {
                name,
                nodelist: self.nodelist,
                span: self.span,
            })),
            Opener::RenderBlock { name } => Node::RenderBlock {
                name,
                nodelist: self.nodelist,
                span: self.span,
            },
            Opener::Tag { name, .. } => {
                self.branches.push(Branch {
                    tag: self.branch_tag,
                    bits: self.branch_bits,
                    nodelist: self.nodelist,
                });
                Node::Tag(TagNode {
                    name,
                    bits: self.bits,
                    branches: self.branches,
                    span: self.span,
                })
            }
            Opener::Root => Node::Text { span: self.span },
        }
    }
}

struct TreeBuilder<'a> {
    specs: &'a TagSpecs,
    frames: Vec<Frame>,
    block_names: HashSet<String>,
    has_extends: bool,
}

impl<'a> TreeBuilder<'a> {
    fn new(specs: &'a TagSpecs) -> Self {
        Self {
            specs,
            frames: vec![Frame::new(Opener::Root, "", Vec::new(), Span::default())],
            block_names: HashSet::new(),
            has_extends: false,
        }
    }

    fn build(mut self, nodes: Vec<RawNode>) -> Result<NodeList, SyntaxError> {
        let mut nodes = nodes.into_iter();
        while let Some(node) = nodes.next() {
            match node {
                RawNode::Text { span } => self.push(Node::Text { span }),
                RawNode::Variable { var, span } => self.push(Node::Variable { var, span }),
                RawNode::Comment { .. } => {}
                RawNode::Tag { name, span, .. } if name == "comment" => {
                    self.top().contains_nontext = true;
                    let end = self.end_of("comment");
                    let closed = nodes
                        .by_ref()
                        .any(|node| matches!(&node, RawNode::Tag { name, .. } if *name == end));
                    if !closed {
                        return Err(SyntaxError::new(
                            SyntaxErrorKind::UnclosedTag {
                                tag: name,
                                expected: vec![end],
                            },
                            span,
                        ));
                    }
                }
                RawNode::Tag { name, bits, span } => self.tag(name, bits, span)?,
            }
        }
        self.finish()
    }

    fn end_of(&self, tag: &str) -> String {
        self.specs
            .get(tag)
            .and_then(|spec| spec.end.clone())
            .unwrap_or_else(|| format!("end{tag}"))
    }

    fn top(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn push(&mut self, node: Node) {
        let frame = self.top();
        if !matches!(node, Node::Text { .. }) {
            frame.contains_nontext = true;
        }
        frame.nodelist.push(node);
    }

    fn tag(&mut self, name: String, bits: Vec<String>, span: Span) -> Result<(), SyntaxError> {
        let top = self.top();
        if top.end_tag() == Some(name.as_str()) {
            if let Opener::Block { name: block } = &top.opener {
                if !bits.is_empty() && bits.as_slice() != std::slice::from_ref(block) {
                    return Err(SyntaxError::new(
                        SyntaxErrorKind::UnexpectedTag {
                            tag: format!("{name} {}", bits.join(" ")),
                            expected: vec!["endblock".to_string(), format!("endblock {block}")],
                        },
                        span,
                    ));
                }
            }
            self.close();
            return Ok(());
        }
        if top.is_intermediate(&name) {
            let nodelist = std::mem::take(&mut top.nodelist);
            let tag = std::mem::replace(&mut top.branch_tag, name);
            let branch_bits = std::mem::replace(&mut top.branch_bits, bits);
            top.branches.push(Branch {
                tag,
                bits: branch_bits,
                nodelist,
            });
            return Ok(());
        }

        match name.as_str() {
            "extends" => self.extends(bits, span),
            "block" => self.open_block(bits, span),
            "include" => {
                let target = Self::target(&name, &bits, span)?;
                self.push(Node::Include { target, span });
                Ok(())
            }
            "ssi" => {
                let target = Self::target(&name, &bits, span)?;
                let parsed = bits.get(1).is_some_and(|bit| bit == "parsed");
                self.push(Node::Ssi {
                    target,
                    parsed,
                    span,
                });
                Ok(())
            }
            "render_block" => {
                let target = Self::target(&name, &bits, span)?;
                self.frames.push(Frame::new(
                    Opener::RenderBlock { name: target },
                    &name,
                    bits,
                    span,
                ));
                Ok(())
            }
            _ => {
                if let Some(tag) = MenuTag::from_name(&name) {
                    let template = tag.template_argument(&bits);
                    self.push(Node::Menu {
                        tag,
                        template,
                        span,
                    });
                    return Ok(());
                }
                if let Some(spec) = self.specs.get(&name).filter(|spec| spec.end.is_some()) {
                    let opener = Opener::Tag {
                        name: name.clone(),
                        spec: spec.clone(),
                    };
                    self.frames.push(Frame::new(opener, &name, bits, span));
                    return Ok(());
                }
                if self.specs.is_closer(&name) {
                    let expected = self.top().expected();
                    return Err(SyntaxError::new(
                        SyntaxErrorKind::UnexpectedTag {
                            tag: name,
                            expected,
                        },
                        span,
                    ));
                }
                self.push(Node::Tag(TagNode {
                    name,
                    bits,
                    branches: Vec::new(),
                    span,
                }));
                Ok(())
            }
        }
    }

    fn target(name: &str, bits: &[String], span: Span) -> Result<Target, SyntaxError> {
        bits.first().map(|bit| Target::parse(bit)).ok_or_else(|| {
            SyntaxError::new(
                SyntaxErrorKind::MissingArgument {
                    tag: name.to_string(),
                },
                span,
            )
        })
    }

    fn extends(&mut self, bits: Vec<String>, span: Span) -> Result<(), SyntaxError> {
        let parent = Self::target("extends", &bits, span)?;
        if self.has_extends {
            return Err(SyntaxError::new(SyntaxErrorKind::MultipleExtends, span));
        }
        if self.frames.len() > 1 || self.frames[0].contains_nontext {
            return Err(SyntaxError::new(SyntaxErrorKind::ExtendsNotFirst, span));
        }
        self.has_extends = true;
        self.push(Node::Extends { parent, span });
        Ok(())
    }

    fn open_block(&mut self, bits: Vec<String>, span: Span) -> Result<(), SyntaxError> {
        let [name] = bits.as_slice() else {
            return Err(SyntaxError::new(SyntaxErrorKind::BlockArguments, span));
        };
        if !self.block_names.insert(name.clone()) {
            return Err(SyntaxError::new(
                SyntaxErrorKind::DuplicateBlock { name: name.clone() },
                span,
            ));
        }
        let opener = Opener::Block { name: name.clone() };
        self.frames.push(Frame::new(opener, "block", bits, span));
        Ok(())
    }

    fn close(&mut self) {
        if self.frames.len() > 1 {
            if let Some(frame) = self.frames.pop() {
                let node = frame.into_node();
                self.push(node);
            }
        }
    }

    fn finish(mut self) -> Result<NodeList, SyntaxError> {
        while self.frames.len() > 1 {
            let top = self.top();
            if matches!(top.opener, Opener::RenderBlock { .. }) {
                self.close();
                continue;
            }
            return Err(SyntaxError::new(
                SyntaxErrorKind::UnclosedTag {
                    tag: top.tag_name().to_string(),
                    expected: top.expected(),
                },
                top.span,
            ));
        }
        let root = self.frames.pop().map(|frame| frame.nodelist);
        Ok(root.unwrap_or_default())
    }
}
