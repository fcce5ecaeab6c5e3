//! render.json validation (friendly errors)
//!
//! Runs on the raw JSON before it is deserialized, so values that the engine would
//! silently clamp can still be pointed out. Issues are reported, never fatal: the loader
//! decides what actually fails.

use std::collections::BTreeSet;

use alphamovie_engine::color::Rgb;
use alphamovie_engine::{loge, logi, logw};

#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub level: IssueLevel,
    pub path: String,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    Warn,
    Error,
}

impl ValidationIssue {
    pub fn warn(path: impl Into<String>, message: impl Into<String>, hint: Option<String>) -> Self {
        Self { level: IssueLevel::Warn, path: path.into(), message: message.into(), hint }
    }
    pub fn error(path: impl Into<String>, message: impl Into<String>, hint: Option<String>) -> Self {
        Self { level: IssueLevel::Error, path: path.into(), message: message.into(), hint }
    }
}

pub fn emit_issues(tag: &str, issues: &[ValidationIssue]) {
    for it in issues {
        let hint = it.hint.as_deref().map(|h| format!(" (hint: {h})")).unwrap_or_default();
        match it.level {
            IssueLevel::Warn => logw!(tag, "{}: {}{}", it.path, it.message, hint),
            IssueLevel::Error => loge!(tag, "{}: {}{}", it.path, it.message, hint),
        }
    }
}

/// One summary line even when there are zero issues, so logs show validation ran.
pub fn emit_summary(tag: &str, label: &str, issues: &[ValidationIssue]) {
    let warns = issues.iter().filter(|i| i.level == IssueLevel::Warn).count();
    let errs = issues.iter().filter(|i| i.level == IssueLevel::Error).count();
    if errs == 0 && warns == 0 {
        logi!(tag, "validation: {label} OK (0 issues)");
    } else {
        logw!(tag, "validation: {label} issues found (errors={errs} warnings={warns})");
    }
}

const KINDS: &[&str] = &["passthrough", "invert_colors", "basic_chroma_key", "advanced_chroma_key"];
const TOP_LEVEL: &[&str] = &["version", "shader", "texture_target"];

/// Validate `render.json`:
/// - top-level shape, version and unknown keys
/// - shader kind and the fields each kind needs
/// - key color format
/// - numbers outside `[0, 1]` (they will be clamped)
/// - texture targets this host cannot feed
pub fn validate_render_json(render: &serde_json::Value) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let Some(obj) = render.as_object() else {
        issues.push(ValidationIssue::error(
            "render.json:/",
            "render.json must be a JSON object",
            Some("expected: { \"shader\": { \"kind\": \"passthrough\" } }".into()),
        ));
        return issues;
    };

    for key in obj.keys() {
        if !TOP_LEVEL.contains(&key.as_str()) {
            issues.push(ValidationIssue::warn(
                format!("render.json:/{}", escape_ptr(key)),
                format!("unknown key '{key}' (ignored in lenient mode, rejected in strict mode)"),
                Some(format!("known keys: {}", TOP_LEVEL.join(", "))),
            ));
        }
    }

    if let Some(v) = obj.get("version") {
        if v.as_u64() != Some(1) {
            issues.push(ValidationIssue::warn(
                "render.json:/version",
                format!("unsupported version {v}"),
                Some("this build understands version 1".into()),
            ));
        }
    }

    match obj.get("texture_target").map(|v| v.as_str()) {
        None | Some(Some("texture_2d")) => {}
        Some(Some("external_oes")) => issues.push(ValidationIssue::warn(
            "render.json:/texture_target",
            "external_oes needs a platform decoder; the desktop test pattern uses texture_2d",
            None,
        )),
        Some(_) => issues.push(ValidationIssue::error(
            "render.json:/texture_target",
            "texture_target must be \"texture_2d\" or \"external_oes\"",
            None,
        )),
    }

    match obj.get("shader") {
        None => {}
        Some(shader) => validate_shader(shader, &mut issues),
    }

    issues
}

fn validate_shader(shader: &serde_json::Value, issues: &mut Vec<ValidationIssue>) {
    let base = "render.json:/shader";
    let Some(obj) = shader.as_object() else {
        issues.push(ValidationIssue::error(base, "shader must be an object", None));
        return;
    };

    let kind = match obj.get("kind").and_then(|v| v.as_str()) {
        Some(k) if KINDS.contains(&k) => k,
        Some(k) => {
            issues.push(ValidationIssue::error(
                format!("{base}/kind"),
                format!("unknown shader kind '{k}'"),
                Some(format!("available: {}", KINDS.join(", "))),
            ));
            return;
        }
        None => {
            issues.push(ValidationIssue::error(
                format!("{base}/kind"),
                "missing or non-string 'kind'",
                Some(format!("available: {}", KINDS.join(", "))),
            ));
            return;
        }
    };

    let (required, optional): (&[&str], &[&str]) = match kind {
        "basic_chroma_key" => (&["key_color", "accuracy"], &[]),
        "advanced_chroma_key" => (&["key_color"], &["threshold_sensitivity", "smoothing"]),
        _ => (&[], &[]),
    };

    let known: BTreeSet<&str> = required.iter().chain(optional).copied().chain(["kind"]).collect();
    for key in obj.keys() {
        if !known.contains(key.as_str()) {
            issues.push(ValidationIssue::warn(
                format!("{base}/{}", escape_ptr(key)),
                format!("'{key}' is not used by {kind}"),
                None,
            ));
        }
    }

    for &field in required {
        if !obj.contains_key(field) {
            issues.push(ValidationIssue::error(
                format!("{base}/{field}"),
                format!("{kind} requires '{field}'"),
                None,
            ));
        }
    }

    if let Some(c) = obj.get("key_color") {
        if !is_valid_color(c) {
            issues.push(ValidationIssue::error(
                format!("{base}/key_color"),
                format!("invalid key color {c}"),
                Some("use \"#RRGGBB\" or [r, g, b] with 0..=255 channels".into()),
            ));
        }
    }

    for field in ["accuracy", "threshold_sensitivity", "smoothing"] {
        let Some(v) = obj.get(field) else { continue };
        match v.as_f64() {
            Some(x) if (0.0..=1.0).contains(&x) => {}
            Some(x) => issues.push(ValidationIssue::warn(
                format!("{base}/{field}"),
                format!("{field}={x} is outside [0, 1] and will be clamped"),
                None,
            )),
            None => issues.push(ValidationIssue::error(
                format!("{base}/{field}"),
                format!("{field} must be a number"),
                None,
            )),
        }
    }
}

fn is_valid_color(v: &serde_json::Value) -> bool {
    match v {
        serde_json::Value::String(s) => s.parse::<Rgb>().is_ok(),
        serde_json::Value::Array(a) => {
            a.len() == 3 && a.iter().all(|c| c.as_u64().map(|n| n <= 255).unwrap_or(false))
        }
        _ => false,
    }
}

// JSON Pointer escaping for friendly paths
fn escape_ptr(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(issues: &[ValidationIssue]) -> Vec<(&str, IssueLevel)> {
        issues.iter().map(|i| (i.path.as_str(), i.level)).collect()
    }

    #[test]
    fn clean_config_has_no_issues() {
        let v = json!({
            "version": 1,
            "shader": { "kind": "advanced_chroma_key", "key_color": "#00ff00",
                        "threshold_sensitivity": 0.1, "smoothing": 0.05 },
            "texture_target": "texture_2d"
        });
        assert!(validate_render_json(&v).is_empty());
    }

    #[test]
    fn out_of_range_values_warn_about_clamping() {
        let v = json!({ "shader": { "kind": "basic_chroma_key", "key_color": [0, 255, 0], "accuracy": 1.4 } });
        let issues = validate_render_json(&v);
        assert_eq!(paths(&issues), vec![("render.json:/shader/accuracy", IssueLevel::Warn)]);
        assert!(issues[0].message.contains("clamped"));
    }

    #[test]
    fn missing_and_bad_fields_are_errors() {
        let v = json!({ "shader": { "kind": "basic_chroma_key", "key_color": "lime" } });
        let issues = validate_render_json(&v);
        assert_eq!(
            paths(&issues),
            vec![
                ("render.json:/shader/accuracy", IssueLevel::Error),
                ("render.json:/shader/key_color", IssueLevel::Error),
            ]
        );
    }

    #[test]
    fn unknown_kind_and_keys_are_reported() {
        let v = json!({ "frag": "x.frag", "shader": { "kind": "sepia" } });
        let issues = validate_render_json(&v);
        assert_eq!(
            paths(&issues),
            vec![
                ("render.json:/frag", IssueLevel::Warn),
                ("render.json:/shader/kind", IssueLevel::Error),
            ]
        );
    }

    #[test]
    fn external_target_is_flagged_for_the_desktop_host() {
        let v = json!({ "texture_target": "external_oes" });
        assert_eq!(
            paths(&validate_render_json(&v)),
            vec![("render.json:/texture_target", IssueLevel::Warn)]
        );
    }
}
