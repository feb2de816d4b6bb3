use super::cache::HelperBinding;
use crate::ast::BlockHelperNode;
use crate::error::CompileError;
use crate::path::{BLOCK_SIGIL, INVERSE_SIGIL};

/// Which body a block helper sees as its primary template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDirection {
    /// `template` is the body, `inverse` is the `{{else}}` section.
    Direct,
    /// The two bodies are swapped.
    Inverse,
}

impl BlockDirection {
    /// Raw blocks and call sites already bound to a block-aware helper are
    /// direct. Inverted sections (`{{^name}}`) are always inverse, as is
    /// everything else, including names still waiting on late binding. The
    /// result is fixed for the life of the call site even if the cell is
    /// rebound later.
    pub fn for_call_site(node: &BlockHelperNode, binding: &HelperBinding) -> Self {
        if node.is_raw {
            BlockDirection::Direct
        } else if is_inverted_section(node) {
            BlockDirection::Inverse
        } else if binding.is_block_aware() {
            BlockDirection::Direct
        } else {
            BlockDirection::Inverse
        }
    }

    /// Orders `(body, inversion)` into `(primary, alternate)`.
    pub fn order<T>(self, body: T, inversion: T) -> (T, T) {
        match self {
            BlockDirection::Direct => (body, inversion),
            BlockDirection::Inverse => (inversion, body),
        }
    }
}

/// True for a `{{^name}}` section.
pub fn is_inverted_section(node: &BlockHelperNode) -> bool {
    node.helper_name.starts_with(INVERSE_SIGIL)
}

/// The name of a block helper node with its opening sigil removed. Only the
/// block and inverse sigils are accepted.
pub fn strip_block_prefix(node: &BlockHelperNode) -> Result<&str, CompileError> {
    node.helper_name
        .strip_prefix(&[BLOCK_SIGIL, INVERSE_SIGIL][..])
        .filter(|name| !name.is_empty())
        .ok_or_else(|| CompileError::UnknownHelperPrefix {
            name: node.helper_name.clone(),
            span: node.span,
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ast::{BlockNode, Node, SourceSpan};
    use crate::helpers::BlockHelperFn;
    use crate::path::PathStore;

    fn node(name: &str) -> BlockHelperNode {
        BlockHelperNode {
            helper_name: name.to_string(),
            arguments: Vec::new(),
            hash: Vec::new(),
            block_params: Vec::new(),
            body: Box::new(Node::Block(BlockNode::empty(SourceSpan::default()))),
            inversion: None,
            is_raw: false,
            span: SourceSpan::single_point(3, 7),
        }
    }

    #[test]
    fn order_swaps_only_for_inverse() {
        assert_eq!(BlockDirection::Direct.order("body", "else"), ("body", "else"));
        assert_eq!(BlockDirection::Inverse.order("body", "else"), ("else", "body"));
    }

    #[test]
    fn late_bound_sites_are_inverse_unless_raw() {
        let binding = HelperBinding::late_bind(&PathStore::intern("direction-late"));
        assert_eq!(
            BlockDirection::for_call_site(&node("#direction-late"), &binding),
            BlockDirection::Inverse
        );
        let raw = BlockHelperNode {
            is_raw: true,
            ..node("#direction-late")
        };
        assert_eq!(
            BlockDirection::for_call_site(&raw, &binding),
            BlockDirection::Direct
        );
    }

    #[test]
    fn inverted_sections_stay_inverse_over_block_helpers() {
        let each = HelperBinding::Resolved(Arc::new(BlockHelperFn::new(
            |_writer, _options, _context, _arguments| Ok(()),
        )));
        assert!(each.is_block_aware());
        assert_eq!(
            BlockDirection::for_call_site(&node("#each"), &each),
            BlockDirection::Direct
        );
        assert_eq!(
            BlockDirection::for_call_site(&node("^each"), &each),
            BlockDirection::Inverse
        );
    }

    #[test]
    fn prefix_must_be_the_block_sigil() {
        assert_eq!(strip_block_prefix(&node("#each")), Ok("each"));
        assert_eq!(strip_block_prefix(&node("#*inline")), Ok("*inline"));

        assert_eq!(strip_block_prefix(&node("^each")), Ok("each"));

        let error = strip_block_prefix(&node("~each")).unwrap_err();
        assert_eq!(
            error,
            CompileError::UnknownHelperPrefix {
                name: "~each".to_string(),
                span: SourceSpan::single_point(3, 7),
            }
        );
        assert!(strip_block_prefix(&node("#")).is_err());
        assert!(strip_block_prefix(&node("^")).is_err());
    }
}
