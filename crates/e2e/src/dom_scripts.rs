//! Page-context element resolver
//!
//! The resolver lives in its own `.js` file and is bundled at compile time.
//! Each call wraps it in an invocation expression carrying the locator, the
//! operation and an optional argument as JSON literals.

use serde_json::{json, Value};

use dashcheck_common::{Locator, Selector};

/// Embedded contents of `scripts/element_resolver.js`
pub const ELEMENT_RESOLVER: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/scripts/element_resolver.js"
));

/// Operations understood by the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverOp {
    Count,
    Probe,
    ScrollIntoView,
    Click,
    Fill,
    Clear,
}

impl ResolverOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolverOp::Count => "count",
            ResolverOp::Probe => "probe",
            ResolverOp::ScrollIntoView => "scroll_into_view",
            ResolverOp::Click => "click",
            ResolverOp::Fill => "fill",
            ResolverOp::Clear => "clear",
        }
    }
}

/// JSON shape of a locator as the resolver reads it
pub fn locator_payload(locator: &Locator) -> Value {
    let name = match &locator.selector {
        Selector::Role { name, .. } => name.clone(),
        _ => None,
    };
    json!({
        "kind": locator.selector.kind(),
        "value": locator.selector.value(),
        "name": name,
        "nth": locator.nth,
    })
}

/// Build the expression evaluating `op` against `locator`
pub fn resolver_call(locator: &Locator, op: ResolverOp, arg: Option<&str>) -> String {
    format!(
        "({})({}, {}, {})",
        ELEMENT_RESOLVER.trim_end().trim_end_matches(';'),
        locator_payload(locator),
        Value::String(op.as_str().to_string()),
        arg.map(|a| Value::String(a.to_string())).unwrap_or(Value::Null),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_script_is_non_empty() {
        assert!(!ELEMENT_RESOLVER.trim().is_empty());
    }

    #[test]
    fn embedded_script_handles_every_selector_kind() {
        for kind in ["css", "xpath", "text", "test_id", "role", "label", "placeholder"] {
            assert!(
                ELEMENT_RESOLVER.contains(&format!("case '{}'", kind)),
                "resolver should handle {kind}"
            );
        }
    }

    #[test]
    fn call_embeds_escaped_arguments() {
        let locator = Locator::role("button", Some("Sign \"in\""));
        let call = resolver_call(&locator, ResolverOp::Fill, Some("a'b\"c"));
        assert!(call.contains(r#""name":"Sign \"in\"""#));
        assert!(call.ends_with(r#", "fill", "a'b\"c")"#));
    }

    #[test]
    fn call_without_argument_passes_null() {
        let call = resolver_call(&Locator::css("#email"), ResolverOp::Probe, None);
        assert!(call.ends_with(r#", "probe", null)"#));
    }
}
