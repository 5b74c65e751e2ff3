//! Permission string matching and sanitization.
//!
//! Permissions are dotted names. A grant ending in `.*` is a wildcard that
//! covers every permission sharing its prefix through the dot:
//!
//! | Grant | Permission | Match |
//! |-------|------------|-------|
//! | `kernel.module.add` | `kernel.module.add` | yes (exact) |
//! | `kernel.module.*` | `kernel.module.add` | yes (wildcard) |
//! | `kernel.module.*` | `kernel.modules.list` | no (prefix must end at a dot) |
//! | `kernel.module.*` | `kernel.module` | no (wildcard covers children only) |

/// Returns `true` if `granted` covers `requested`.
///
/// `granted` may be an exact permission or a wildcard `X.*`; `requested`
/// is always a concrete permission.
#[must_use]
pub fn wildcard_matches(granted: &str, requested: &str) -> bool {
    if granted == requested {
        return true;
    }
    if let Some(stem) = granted.strip_suffix(".*") {
        // "kernel.module.*" covers "kernel.module.<anything>", nothing else.
        return requested.len() > stem.len() + 1
            && requested.starts_with(stem)
            && requested.as_bytes()[stem.len()] == b'.';
    }
    false
}

/// Sanitizes a dynamic permission component.
///
/// Any character outside `[A-Za-z0-9.-]` is replaced with `_`, preventing
/// injection of dots-via-encoding tricks or wildcard suffixes through
/// user-supplied values (event types, config keys, module names). The
/// transformation is idempotent.
#[must_use]
pub fn sanitize_component(component: &str) -> String {
    component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        assert!(wildcard_matches("kernel.module.add", "kernel.module.add"));
        assert!(!wildcard_matches("kernel.module.add", "kernel.module.remove"));
    }

    #[test]
    fn wildcard_covers_children() {
        assert!(wildcard_matches("kernel.module.*", "kernel.module.add"));
        assert!(wildcard_matches("kernel.module.*", "kernel.module.remove"));
        assert!(wildcard_matches("core.events.*", "core.events.publish.user.login"));
    }

    #[test]
    fn wildcard_requires_dot_boundary() {
        assert!(!wildcard_matches("kernel.module.*", "kernel.modules.list"));
        assert!(!wildcard_matches("kernel.mod.*", "kernel.module.add"));
    }

    #[test]
    fn wildcard_does_not_cover_its_own_stem() {
        assert!(!wildcard_matches("kernel.module.*", "kernel.module"));
        assert!(!wildcard_matches("kernel.module.*", "kernel.module."));
    }

    #[test]
    fn bare_star_is_not_a_wildcard() {
        // Only the ".*" suffix form is a wildcard.
        assert!(!wildcard_matches("*", "kernel.module.add"));
    }

    #[test]
    fn sanitize_passes_safe_characters() {
        assert_eq!(sanitize_component("user.login-v2"), "user.login-v2");
        assert_eq!(sanitize_component("Noop123"), "Noop123");
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_component("user login"), "user_login");
        assert_eq!(sanitize_component("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_component("evil.*"), "evil._");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize_component("wild*card topic!");
        let twice = sanitize_component(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn sanitized_wildcard_cannot_widen_grant() {
        // A subscriber-supplied "x.*" must not become a wildcard grant.
        let perm = format!("core.events.publish.{}", sanitize_component("x.*"));
        assert_eq!(perm, "core.events.publish.x._");
        assert!(!wildcard_matches(&perm, "core.events.publish.x.secret"));
    }
}
