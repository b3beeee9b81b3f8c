use uuid::Uuid;

const LEGAL_ROOTS: [&str; 5] = ["profile", "projects", "organizations", "concepts", "reference"];
const MAX_DEPTH: usize = 6;

/// Lowercases, collapses whitespace, then takes a version-5 UUID over a
/// fixed namespace. The same normalized text always yields the same id,
/// which is what gives ingestion its idempotence.
pub fn deterministic_id(text: &str) -> Uuid {
    let normalized = normalize_text(text);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, normalized.as_bytes())
}

fn normalize_text(text: &str) -> String {
    text.trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Replaces any char outside `[A-Za-z0-9_]` with `_`, trims leading/trailing
/// `_`, lowercases; empty input becomes `"unknown"`.
pub fn sanitize_label(s: &str) -> String {
    let replaced: String = s
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let trimmed = replaced.trim_matches('_').to_lowercase();
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed
    }
}

/// Normalizes `/` and `\` to `.`, splits, sanitizes each segment, rewrites a
/// leading `user` root to `profile`, caps depth at 6; empty input becomes
/// `reference.unknown`.
pub fn sanitize_path(p: &str) -> String {
    let normalized = p.replace(['/', '\\'], ".");
    let mut segments: Vec<String> = normalized
        .split('.')
        .map(sanitize_label)
        .filter(|s| !s.is_empty())
        .collect();

    if segments.is_empty() {
        return "reference.unknown".to_string();
    }

    if segments[0] == "user" {
        segments[0] = "profile".to_string();
    }

    segments.truncate(MAX_DEPTH);
    segments.join(".")
}

/// True if `root` is one of the five enumerated L1 categories.
pub fn is_legal_root(root: &str) -> bool {
    LEGAL_ROOTS.contains(&root)
}

/// Half-keep truncation with a marker, used by conflict arbitration to cap
/// old/new text at 6000 chars before sending both to the LLM.
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let marker = "\n...[TRUNCATED]...\n";
    let keep = max_len.saturating_sub(marker.chars().count());
    let head_len = keep / 2;
    let tail_len = keep - head_len;

    let chars: Vec<char> = text.chars().collect();
    let head: String = chars[..head_len].iter().collect();
    let tail: String = chars[chars.len() - tail_len..].iter().collect();
    format!("{head}{marker}{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_id_is_stable_under_whitespace_and_case() {
        let a = deterministic_id("  Hello   World  ");
        let b = deterministic_id("hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn deterministic_id_differs_for_different_content() {
        assert_ne!(deterministic_id("foo"), deterministic_id("bar"));
    }

    #[test]
    fn sanitize_label_replaces_illegal_chars() {
        assert_eq!(sanitize_label("Hello, World!"), "hello__world_");
    }

    #[test]
    fn sanitize_label_empty_becomes_unknown() {
        assert_eq!(sanitize_label("!!!"), "unknown");
        assert_eq!(sanitize_label(""), "unknown");
    }

    #[test]
    fn sanitize_path_rewrites_user_root_to_profile() {
        assert_eq!(sanitize_path("user.name"), "profile.name");
        assert_eq!(sanitize_path("user/location"), "profile.location");
    }

    #[test]
    fn sanitize_path_caps_depth() {
        let deep = "a.b.c.d.e.f.g.h";
        let sanitized = sanitize_path(deep);
        assert_eq!(sanitized.split('.').count(), MAX_DEPTH);
    }

    #[test]
    fn sanitize_path_empty_becomes_reference_unknown() {
        assert_eq!(sanitize_path(""), "reference.unknown");
        assert_eq!(sanitize_path("!!!"), "reference.unknown");
    }

    #[test]
    fn sanitize_path_is_idempotent() {
        let p = "Projects/My App!!/Sub Module";
        assert_eq!(sanitize_path(&sanitize_path(p)), sanitize_path(p));
    }

    #[test]
    fn legal_roots_recognizes_five_values() {
        for root in LEGAL_ROOTS {
            assert!(is_legal_root(root));
        }
        assert!(!is_legal_root("user"));
    }

    #[test]
    fn truncate_text_keeps_head_and_tail_with_marker() {
        let text = "a".repeat(100) + &"b".repeat(100);
        let truncated = truncate_text(&text, 50);
        assert!(truncated.contains("[TRUNCATED]"));
        assert!(truncated.starts_with('a'));
        assert!(truncated.ends_with('b'));
    }

    #[test]
    fn truncate_text_no_op_under_limit() {
        assert_eq!(truncate_text("short", 100), "short");
    }
}
