//! Revision expressions: a base name followed by ancestry steps.
//!
//! `HEAD`, `main`, `v1.0`, `refs/heads/main` or a full hex id, optionally
//! followed by any number of `~N` (N-th first-parent ancestor, `~` alone
//! meaning `~1`) and `^N` (N-th parent, `^` alone meaning `^1`, `^0` the
//! commit itself).

/// One ancestry step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Follow the first parent this many times.
    Ancestor(usize),
    /// Select the parent with this 1-based index; 0 stays put.
    Parent(usize),
}

/// A parsed revision expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevSpec<'a> {
    pub base: &'a str,
    pub steps: Vec<Step>,
}

/// Split `spec` into its base and steps. `None` if the syntax is invalid.
pub fn parse(spec: &str) -> Option<RevSpec<'_>> {
    let split = spec.find(['~', '^']).unwrap_or(spec.len());
    let (base, mut rest) = spec.split_at(split);
    if base.is_empty() {
        return None;
    }

    let mut steps = Vec::new();
    while let Some(op) = rest.chars().next() {
        rest = &rest[op.len_utf8()..];
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        let count = if digits == 0 {
            1
        } else {
            rest[..digits].parse().ok()?
        };
        rest = &rest[digits..];
        steps.push(match op {
            '~' => Step::Ancestor(count),
            '^' => Step::Parent(count),
            _ => return None,
        });
    }
    Some(RevSpec { base, steps })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_names() {
        assert_eq!(
            parse("HEAD"),
            Some(RevSpec {
                base: "HEAD",
                steps: vec![]
            })
        );
        assert_eq!(parse("feature/auth").unwrap().base, "feature/auth");
    }

    #[test]
    fn ancestry_suffixes() {
        assert_eq!(parse("HEAD~1").unwrap().steps, vec![Step::Ancestor(1)]);
        assert_eq!(parse("HEAD~").unwrap().steps, vec![Step::Ancestor(1)]);
        assert_eq!(parse("main~12").unwrap().steps, vec![Step::Ancestor(12)]);
        assert_eq!(
            parse("main^^2~3").unwrap().steps,
            vec![Step::Parent(1), Step::Parent(2), Step::Ancestor(3)]
        );
        assert_eq!(parse("HEAD^0").unwrap().steps, vec![Step::Parent(0)]);
    }

    #[test]
    fn rejects_missing_base_and_garbage() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("~1"), None);
        assert_eq!(parse("HEAD~x"), None);
        assert_eq!(parse("HEAD~1é"), None);
    }
}
