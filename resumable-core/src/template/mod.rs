//! Templates
//!
//! A template is a sequence of static strings with a value between each
//! pair. The strings are parsed once per call site into a [`Blueprint`];
//! every later render of that call site reuses it.
//!
//! # Binding syntax
//!
//! ```text
//! <p class="note ${kind}">${message}</p>     attribute segment, child content
//! <input .value=${text} checked=${done}>     property bindings
//! <button @click=${on_click}>+</button>      event listener
//! ```
//!
//! # Rendering
//!
//! [`TemplateInstance`] holds a live copy of a blueprint and updates only
//! the bindings whose value changed. [`RenderRoot`] manages the instance
//! rendered into one container. Lists are reconciled by position
//! ([`Value::List`]) or by identity ([`repeat`], [`KeyedList`]). Long
//! scrolled lists render only their visible rows with [`windowed`].

mod blueprint;
mod cache;
mod error;
mod instance;
mod keyed;
pub mod parser;
mod value;
mod window;

pub use blueprint::{
    AttributeTemplate, BindingDescriptor, BindingKind, Blueprint, NodePath, BOOLEAN_PROPERTIES,
    PART_END, PART_START,
};
pub use cache::{blueprint_for, cached_blueprints};
pub use error::{ParseError, TemplateError};
pub use instance::{RenderRoot, TemplateInstance};
pub use keyed::KeyedList;
pub use value::{repeat, Key, TemplateKey, TemplateResult, Value};
pub use window::{windowed, VisibleRange, Window};

pub(crate) use blueprint::ProtoKind;

use crate::dom::{Document, Node};

/// Build a [`TemplateResult`] from alternating string literals and values.
///
/// ```rust
/// use resumable_core::html;
///
/// let name = "world";
/// let greeting = html!("<p>Hello ", name, "!</p>");
/// assert_eq!(greeting.values().len(), 1);
/// ```
#[macro_export]
macro_rules! html {
    ($first:literal $(, $value:expr, $rest:literal)* $(,)?) => {{
        // An array static, so every call site owns a distinct address.
        static STRINGS: [&str; [$first $(, $rest)*].len()] = [$first $(, $rest)*];
        $crate::template::TemplateResult::new(
            &STRINGS,
            ::std::vec![$($crate::template::Value::from($value)),*],
        )
    }};
}

/// Parse plain HTML into a fragment of nodes owned by `doc`.
pub(crate) fn parse_fragment(doc: &Document, html: &str) -> Result<Node, ParseError> {
    Ok(parser::parse(&[html])?.instantiate(doc))
}
