use cmst_templates::split_tag_args;
use cmst_templates::static_reference;
use cmst_templates::Lexer;
use cmst_templates::Token;

use crate::reference::Reference;

/// The templates `source` names directly, in document order.
///
/// Only lexes: nothing is loaded or compiled, so this works on content that
/// does not compile and never fails on a missing callee.
#[must_use]
pub fn direct_references(caller: &str, source: &str) -> Vec<Reference> {
    let (tokens, _) = Lexer::new(source).tokenize();
    let mut references = Vec::new();
    let mut in_comment = false;

    for token in &tokens {
        let Token::Block { content, .. } = token else {
            continue;
        };
        let Some((name, bits)) = split_tag_args(content) else {
            continue;
        };
        if in_comment {
            in_comment = name != "endcomment";
            continue;
        }
        if name == "comment" {
            in_comment = true;
            continue;
        }
        if let Some((relation, callee)) = static_reference(&name, &bits) {
            references.push(Reference::new(callee, relation, caller));
        }
    }

    references
}
