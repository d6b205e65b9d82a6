//! Django template compilation for static analysis.
//!
//! The pipeline has three stages:
//!
//! 1. **Lexing**: template text is split into Django constructs (tags,
//!    variables, comments) and text, honouring `{% verbatim %}`.
//! 2. **Parsing**: tokens become a flat node list with tag arguments and
//!    variables split from their filters.
//! 3. **Compiling**: the flat list is nested into a [`Template`] tree using
//!    [`TagSpecs`], with Django's structural rules (`extends` first, unique
//!    block names, balanced container tags) reported as [`SyntaxError`]s.
//!
//! ## Example
//!
//! ```
//! use cmst_templates::{compile, CompileOptions, TagSpecs};
//!
//! let specs = TagSpecs::builtins().unwrap();
//! let template = compile(
//!     "page.html",
//!     "{% extends 'base.html' %}{% block content %}{% include 'nav.html' %}{% endblock %}",
//!     CompileOptions::default(),
//!     &specs,
//! )
//! .unwrap();
//! assert_eq!(template.extends().and_then(|t| t.literal()), Some("base.html"));
//! ```

mod compile;
mod error;
mod lexer;
pub mod nodelist;
mod parser;
mod span;
pub mod tagspecs;
mod tokens;

pub use compile::compile;
pub use compile::CompileOptions;
pub use error::Location;
pub use error::SyntaxError;
pub use error::SyntaxErrorKind;
pub use lexer::Lexer;
pub use nodelist::static_reference;
pub use nodelist::Node;
pub use nodelist::NodeList;
pub use nodelist::Relation;
pub use nodelist::Template;
pub use parser::split_tag_args;
pub use parser::ParseError;
pub use parser::Parser;
pub use parser::RawNode;
pub use span::LineOffsets;
pub use span::Span;
pub use tagspecs::TagSpecError;
pub use tagspecs::TagSpecs;
pub use tokens::Token;
