//! Process-wide blueprint cache.
//!
//! Blueprints are keyed by the address of a template's static string table,
//! so every call site is parsed once. Parse failures are not cached.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use super::blueprint::Blueprint;
use super::error::ParseError;
use super::parser;
use super::value::TemplateResult;
use super::TemplateKey;

static BLUEPRINTS: OnceLock<DashMap<TemplateKey, Arc<Blueprint>>> = OnceLock::new();

fn blueprints() -> &'static DashMap<TemplateKey, Arc<Blueprint>> {
    BLUEPRINTS.get_or_init(DashMap::new)
}

/// The blueprint for `result`'s template, parsing it on first use.
pub fn blueprint_for(result: &TemplateResult) -> Result<Arc<Blueprint>, ParseError> {
    let key = result.key();
    if let Some(cached) = blueprints().get(&key) {
        return Ok(Arc::clone(cached.value()));
    }

    let parsed = Arc::new(parser::parse(result.strings())?);
    tracing::debug!(
        nodes = parsed.node_count(),
        bindings = parsed.binding_count(),
        "parsed template"
    );
    Ok(Arc::clone(blueprints().entry(key).or_insert(parsed).value()))
}

/// Number of cached blueprints.
pub fn cached_blueprints() -> usize {
    blueprints().len()
}
