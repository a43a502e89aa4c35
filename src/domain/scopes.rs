// ============================================================
// Layer 3 — Variable Scopes
// ============================================================
// Variables are addressed by their dotted module path, e.g.
//
//   conv1.weight
//   conv1.bias
//   logits.weight
//   aux_logits.fc.weight
//
// A "scope" is a name prefix. Two selections use scopes:
//
//   trainable scopes   → only variables under these scopes
//                        receive optimizer updates
//   exclusion scopes   → variables under these scopes are NOT
//                        restored from a pretrained checkpoint
//
// Scopes are compared as raw string prefixes after trimming
// surrounding whitespace, so "conv" matches both "conv1.*"
// and "conv2.*".

/// Trim each scope; drop the ones that end up empty.
pub fn normalize_scopes(scopes: &[String]) -> Vec<String> {
    scopes
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Variables to train.
///
/// `None` → every variable.
/// `Some(scopes)` → for each scope in order, the variables whose name
/// starts with it. A variable matched by two scopes appears twice,
/// as a plain concatenation of per-scope collections would.
pub fn select_trainable<'a>(names: &'a [String], scopes: Option<&[String]>) -> Vec<&'a str> {
    let Some(scopes) = scopes else {
        return names.iter().map(String::as_str).collect();
    };

    let mut selected = Vec::new();
    for scope in normalize_scopes(scopes) {
        selected.extend(
            names
                .iter()
                .filter(|name| name.starts_with(scope.as_str()))
                .map(String::as_str),
        );
    }
    selected
}

/// Variables to restore: everything not under an exclusion scope.
pub fn select_restorable<'a>(names: &'a [String], exclusions: Option<&[String]>) -> Vec<&'a str> {
    let exclusions = exclusions.map(normalize_scopes).unwrap_or_default();
    names
        .iter()
        .filter(|name| !exclusions.iter().any(|ex| name.starts_with(ex.as_str())))
        .map(String::as_str)
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        ["conv1.weight", "conv1.bias", "conv2.weight", "conv2.bias", "logits.weight", "logits.bias"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn scopes(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_scopes_trains_everything() {
        let names = names();
        assert_eq!(select_trainable(&names, None).len(), 6);
    }

    #[test]
    fn test_trainable_prefix_match() {
        let names  = names();
        let scopes = scopes(&["logits"]);
        assert_eq!(
            select_trainable(&names, Some(scopes.as_slice())),
            vec!["logits.weight", "logits.bias"]
        );
    }

    #[test]
    fn test_trainable_scopes_are_trimmed_and_ordered() {
        let names  = names();
        let scopes = scopes(&[" logits ", "conv2"]);
        assert_eq!(
            select_trainable(&names, Some(scopes.as_slice())),
            vec!["logits.weight", "logits.bias", "conv2.weight", "conv2.bias"]
        );
    }

    #[test]
    fn test_raw_prefix_spans_siblings() {
        let names  = names();
        let scopes = scopes(&["conv"]);
        assert_eq!(select_trainable(&names, Some(scopes.as_slice())).len(), 4);
    }

    #[test]
    fn test_empty_scope_list_trains_nothing() {
        let names = names();
        let none: Vec<String> = Vec::new();
        assert!(select_trainable(&names, Some(none.as_slice())).is_empty());
    }

    #[test]
    fn test_restore_excludes_scopes() {
        let names      = names();
        let exclusions = scopes(&["logits", " conv2"]);
        assert_eq!(
            select_restorable(&names, Some(exclusions.as_slice())),
            vec!["conv1.weight", "conv1.bias"]
        );
    }

    #[test]
    fn test_restore_without_exclusions_keeps_all() {
        let names = names();
        assert_eq!(select_restorable(&names, None).len(), 6);
        // whitespace-only exclusions do not exclude everything
        let blank = scopes(&["  "]);
        assert_eq!(select_restorable(&names, Some(blank.as_slice())).len(), 6);
    }
}
