use thiserror::Error;

/// Malformed template structure, found while building a blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("element <{tag}> is never closed")]
    UnclosedElement { tag: String },

    #[error("closing tag </{tag}> has no matching open tag")]
    UnexpectedClosingTag { tag: String },

    #[error("expected </{expected}>, found </{found}>")]
    MismatchedClosingTag { expected: String, found: String },

    #[error("tag <{tag} is not terminated")]
    UnterminatedTag { tag: String },

    #[error("comment is not terminated")]
    UnterminatedComment,

    #[error("interpolation inside a tag name")]
    HoleInTagName,

    #[error("interpolation inside an attribute name")]
    HoleInAttributeName,

    #[error("interpolation inside a comment")]
    HoleInComment,

    #[error("interpolation inside <{tag}> text")]
    HoleInRawText { tag: String },

    #[error("event binding `{name}` must be a single interpolation")]
    InvalidEventBinding { name: String },

    #[error("property binding `{name}` must be a single interpolation")]
    InvalidPropertyBinding { name: String },
}

/// Errors raised while rendering or updating a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("template has {expected} bindings but {actual} values were supplied")]
    BindingCountMismatch { expected: usize, actual: usize },

    #[error("event binding `{event}` expects a handler, got {found}")]
    NotAHandler { event: String, found: &'static str },

    #[error("binding {index} is a content position and cannot hold a {found}")]
    NotRenderable { index: usize, found: &'static str },
}
