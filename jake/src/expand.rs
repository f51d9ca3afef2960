//! `{{var}}` interpolation shared by the executor and the hook runner.

use std::collections::HashMap;

/// Built-in keys recognized before falling back to the variable map.
pub struct Builtins<'a> {
    /// `{{name}}` — the current recipe's name.
    pub name: &'a str,
    /// `{{status}}` — `"success"` or `"failed"`, when known.
    pub status: Option<&'a str>,
    /// `{{error}}` — the error message, when the recipe failed.
    pub error: Option<&'a str>,
}

/// Expand every `{{name}}` sequence in `input` left-to-right. Recognized
/// built-in keys are resolved first; anything else is looked up in
/// `variables`. A name that resolves nowhere leaves the literal `{{name}}`
/// text untouched. A `{` not immediately followed by another `{` is
/// literal.
#[must_use]
pub fn expand(input: &str, builtins: &Builtins<'_>, variables: &HashMap<String, String>) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'{' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            if let Some(end) = input[i + 2..].find("}}") {
                let name = &input[i + 2..i + 2 + end];
                match resolve(name, builtins, variables) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push_str("{{");
                        out.push_str(name);
                        out.push_str("}}");
                    }
                }
                i = i + 2 + end + 2;
                continue;
            }
        }
        // Push one char (not just one byte) to stay on UTF-8 boundaries.
        let ch = input[i..].chars().next().unwrap_or('\u{FFFD}');
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}

fn resolve(name: &str, builtins: &Builtins<'_>, variables: &HashMap<String, String>) -> Option<String> {
    match name {
        "name" => Some(builtins.name.to_string()),
        "status" => builtins.status.map(ToString::to_string),
        "error" => Some(builtins.error.unwrap_or("").to_string()),
        _ => variables.get(name).cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtins() -> Builtins<'static> {
        Builtins {
            name: "deploy",
            status: Some("failed"),
            error: Some("boom"),
        }
    }

    #[test]
    fn expands_builtin_name() {
        let vars = HashMap::new();
        assert_eq!(expand("{{name}}", &builtins(), &vars), "deploy");
    }

    #[test]
    fn expands_builtin_status_and_error() {
        let vars = HashMap::new();
        assert_eq!(expand("{{status}}", &builtins(), &vars), "failed");
        assert_eq!(expand("{{error}}", &builtins(), &vars), "boom");
    }

    #[test]
    fn unknown_status_when_none_resolves_empty_error() {
        let builtins = Builtins {
            name: "x",
            status: None,
            error: None,
        };
        let vars = HashMap::new();
        assert_eq!(expand("{{error}}", &builtins, &vars), "");
        assert_eq!(expand("{{status}}", &builtins, &vars), "{{status}}");
    }

    #[test]
    fn unknown_name_is_left_untouched() {
        let vars = HashMap::new();
        assert_eq!(expand("{{nope}}", &builtins(), &vars), "{{nope}}");
    }

    #[test]
    fn falls_back_to_variable_map() {
        let mut vars = HashMap::new();
        vars.insert("target".to_string(), "prod".to_string());
        assert_eq!(expand("deploy to {{target}}", &builtins(), &vars), "deploy to prod");
    }

    #[test]
    fn lone_brace_is_literal() {
        let vars = HashMap::new();
        assert_eq!(expand("{ not a var }", &builtins(), &vars), "{ not a var }");
    }

    #[test]
    fn re_expanding_is_a_no_op() {
        let vars = HashMap::new();
        let once = expand("{{name}} did {{status}}", &builtins(), &vars);
        let twice = expand(&once, &builtins(), &vars);
        assert_eq!(once, twice);
    }
}
