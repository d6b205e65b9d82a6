//! Static dependency analysis for Django CMS templates.
//!
//! The [`extract_references`] walker follows `include`, `ssi`, `extends`
//! (with block overrides and `{{ block.super }}`), sekizai `render_block` and
//! the CMS menu tags through a compiled template. [`validate_no_cycles`]
//! builds the name-keyed dependency graph breadth first and stops at the
//! first cycle, and [`TemplateValidator`] runs every check a template has to
//! pass before it can be saved.
//!
//! ```
//! use cmst_analysis::MemoryStore;
//! use cmst_analysis::TemplateValidator;
//! use cmst_templates::TagSpecs;
//!
//! let store = MemoryStore::new().with("base.html", "{% block body %}{% endblock %}");
//! let specs = TagSpecs::builtins().unwrap();
//! let validator = TemplateValidator::new(&store, &specs);
//!
//! let used = validator
//!     .validate("page.html", "{% extends 'base.html' %}")
//!     .unwrap();
//! assert!(used.contains("base.html"));
//! ```

mod error;
mod extract;
pub mod graph;
mod loader;
mod recursion;
mod reference;
mod scan;
pub mod store;
mod validate;

pub use error::AnalysisError;
pub use extract::extract_references;
pub use graph::find_cycle;
pub use graph::DiGraph;
pub use graph::GraphError;
pub use loader::TemplateLoader;
pub use recursion::validate_no_cycles;
pub use recursion::CycleError;
pub use reference::Reference;
pub use scan::direct_references;
pub use store::DirectoryStore;
pub use store::MemoryStore;
pub use store::TemplateStore;
pub use validate::TemplateValidator;
pub use validate::ValidationError;
