//! Field and method descriptor rewriting.
//!
//! Descriptors are the compact type strings class files use everywhere:
//! `I`, `Lorg/lz4/LZ4Factory;`, `([BLjava/lang/String;)V`. The only pieces a
//! rewrite can touch are the class names inside `L...;` tokens; primitives,
//! array markers, and the parameter parentheses pass through verbatim, so a
//! single scanner serves both field and method descriptors.

/// Rewrite every class name in a field or method descriptor.
///
/// `map` receives each internal class name and returns `Ok(Some(new))` to
/// substitute it, `Ok(None)` to keep it, or an error to abort. The outer
/// result is `Ok(None)` when nothing changed, so callers can skip re-encoding
/// untouched strings.
///
/// # Errors
///
/// Propagates mapper errors. An unterminated `L...` token is copied through
/// untouched rather than rejected; descriptor validity is the class-file
/// parser's concern, not the rewriter's.
pub fn rewrite_descriptor<E>(
    desc: &str,
    map: &mut impl FnMut(&str) -> Result<Option<String>, E>,
) -> Result<Option<String>, E> {
    let mut out = String::with_capacity(desc.len());
    let mut changed = false;
    let mut rest = desc;

    while let Some(pos) = rest.find('L') {
        let (head, tail) = rest.split_at(pos);
        out.push_str(head);
        let Some(end) = tail.find(';') else {
            // Unterminated object type: keep the remainder as-is.
            out.push_str(tail);
            rest = "";
            break;
        };
        let name = &tail[1..end];
        out.push('L');
        match map(name)? {
            Some(new) => {
                changed = true;
                out.push_str(&new);
            }
            None => out.push_str(name),
        }
        out.push(';');
        rest = &tail[end + 1..];
    }
    out.push_str(rest);

    Ok(changed.then_some(out))
}

/// Collect every class name referenced by a field or method descriptor.
pub fn referenced_classes(desc: &str, sink: &mut impl FnMut(&str)) {
    let mut rest = desc;
    while let Some(pos) = rest.find('L') {
        let tail = &rest[pos..];
        let Some(end) = tail.find(';') else { break };
        sink(&tail[1..end]);
        rest = &tail[end + 1..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn shade(name: &str) -> Result<Option<String>, Infallible> {
        Ok(name
            .strip_prefix("org/lz4/")
            .map(|rest| format!("shaded/lz4/{rest}")))
    }

    #[test]
    fn rewrites_field_descriptor() {
        let out = rewrite_descriptor("Lorg/lz4/LZ4Factory;", &mut shade).unwrap();
        assert_eq!(out.as_deref(), Some("Lshaded/lz4/LZ4Factory;"));
    }

    #[test]
    fn rewrites_method_descriptor_with_arrays_and_primitives() {
        let out =
            rewrite_descriptor("([BLorg/lz4/LZ4Factory;I[[Lother/Kept;)J", &mut shade).unwrap();
        assert_eq!(
            out.as_deref(),
            Some("([BLshaded/lz4/LZ4Factory;I[[Lother/Kept;)J")
        );
    }

    #[test]
    fn untouched_descriptor_returns_none() {
        assert_eq!(rewrite_descriptor("(IJ)V", &mut shade).unwrap(), None);
        assert_eq!(
            rewrite_descriptor("Lother/Kept;", &mut shade).unwrap(),
            None
        );
    }

    #[test]
    fn collects_referenced_classes() {
        let mut seen = Vec::new();
        referenced_classes("([BLa/B;Lc/D;)Le/F;", &mut |n| seen.push(n.to_string()));
        assert_eq!(seen, vec!["a/B", "c/D", "e/F"]);
    }
}
