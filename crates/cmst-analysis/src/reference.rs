use std::fmt;

use cmst_templates::Relation;
use serde::Serialize;

/// One static reference from `caller` to `callee`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Reference {
    pub callee: String,
    pub relation: Relation,
    pub caller: String,
}

impl Reference {
    pub fn new(callee: impl Into<String>, relation: Relation, caller: impl Into<String>) -> Self {
        Self {
            callee: callee.into(),
            relation,
            caller: caller.into(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.caller, self.callee, self.relation)
    }
}
