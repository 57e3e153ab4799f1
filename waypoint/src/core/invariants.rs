//! Semantic invariants not expressible via JSON Schema.

use std::collections::{HashMap, HashSet};

use crate::journey::JourneyDeclaration;

/// Two declared pieces sharing one sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateSequence {
    pub number: i64,
    pub first: String,
    pub second: String,
}

/// Check structural invariants of a declaration:
/// - `domain` and `version` are non-empty marker-safe tokens
/// - piece and group names are non-empty and marker-safe
pub fn validate_invariants(decl: &JourneyDeclaration) -> Vec<String> {
    let mut errors = Vec::new();

    check_token("domain", &decl.domain, &mut errors);
    check_token("version", &decl.version, &mut errors);

    for (group, pieces) in &decl.groups {
        if group.trim().is_empty() {
            errors.push(format!("group with {} pieces has an empty name", pieces.len()));
        }
    }

    for (group, piece) in decl.pieces() {
        let path = piece_path(group, &piece.name);
        if piece.name.trim().is_empty() {
            errors.push(format!(
                "{}: piece {} has an empty name",
                group.unwrap_or("root"),
                piece.sequence_number
            ));
        } else if piece
            .name
            .chars()
            .any(|c| matches!(c, '(' | ')' | '\n' | '\r'))
        {
            errors.push(format!(
                "{path}: piece name must not contain parentheses or line breaks"
            ));
        }
    }

    errors
}

/// Every sequence number claimed by more than one piece, in declaration order.
pub fn duplicate_sequence_numbers(decl: &JourneyDeclaration) -> Vec<DuplicateSequence> {
    let mut seen: HashMap<i64, String> = HashMap::new();
    let mut duplicates = Vec::new();
    for (group, piece) in decl.pieces() {
        let path = piece_path(group, &piece.name);
        match seen.get(&piece.sequence_number) {
            Some(first) => duplicates.push(DuplicateSequence {
                number: piece.sequence_number,
                first: first.clone(),
                second: path,
            }),
            None => {
                seen.insert(piece.sequence_number, path);
            }
        }
    }
    duplicates
}

/// Non-fatal authoring issues:
/// - the same piece name used more than once
/// - dependencies on sequence numbers nobody declares
pub fn sequence_warnings(decl: &JourneyDeclaration) -> Vec<String> {
    let mut warnings = Vec::new();

    let mut names = HashSet::new();
    let mut reported = HashSet::new();
    for (_, piece) in decl.pieces() {
        if !names.insert(piece.name.as_str()) && reported.insert(piece.name.as_str()) {
            warnings.push(format!(
                "piece name '{}' is used more than once; audit recovery cannot tell them apart",
                piece.name
            ));
        }
    }

    let numbers: HashSet<i64> = decl.pieces().map(|(_, piece)| piece.sequence_number).collect();
    for (group, piece) in decl.pieces() {
        for dep in &piece.dependencies {
            if !numbers.contains(dep) {
                warnings.push(format!(
                    "{} depends on non-existent sequence number {}",
                    piece_path(group, &piece.name),
                    dep
                ));
            }
        }
    }

    warnings
}

fn check_token(field: &str, value: &str, errors: &mut Vec<String>) {
    if value.is_empty() {
        errors.push(format!("{field} must not be empty"));
        return;
    }
    if value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, ':' | '(' | ')'))
    {
        errors.push(format!(
            "{field} '{value}' must not contain whitespace, ':' or parentheses"
        ));
    }
}

fn piece_path(group: Option<&str>, name: &str) -> String {
    match group {
        Some(group) => format!("{group}/{name}"),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{declaration, declaration_with_groups, piece};

    #[test]
    fn valid_declaration_has_no_errors() {
        let decl = declaration("course", vec![piece(1, "intro"), piece(2, "body")]);
        assert!(validate_invariants(&decl).is_empty());
        assert!(duplicate_sequence_numbers(&decl).is_empty());
        assert!(sequence_warnings(&decl).is_empty());
    }

    #[test]
    fn reports_marker_unsafe_tokens_and_names() {
        let mut decl = declaration("my course", vec![piece(1, "intro (draft)"), piece(2, " ")]);
        decl.version = String::new();

        let errors = validate_invariants(&decl);
        assert!(errors.iter().any(|err| err.contains("domain 'my course'")));
        assert!(errors.iter().any(|err| err.contains("version must not be empty")));
        assert!(errors.iter().any(|err| err.contains("intro (draft)")));
        assert!(errors.iter().any(|err| err.contains("piece 2 has an empty name")));
    }

    #[test]
    fn duplicates_across_root_and_groups_are_found() {
        let decl = declaration_with_groups(
            "course",
            vec![piece(3, "root-three")],
            vec![("extra", vec![piece(3, "group-three"), piece(4, "four")])],
        );
        let duplicates = duplicate_sequence_numbers(&decl);
        assert_eq!(
            duplicates,
            vec![DuplicateSequence {
                number: 3,
                first: "root-three".to_string(),
                second: "extra/group-three".to_string(),
            }]
        );
    }

    #[test]
    fn warnings_cover_repeated_names_and_dangling_dependencies() {
        let mut dependent = piece(2, "guide");
        dependent.dependencies = vec![1, 7];
        let decl = declaration_with_groups(
            "course",
            vec![piece(1, "README.md"), dependent],
            vec![("a", vec![piece(3, "README.md")]), ("b", vec![piece(4, "README.md")])],
        );

        let warnings = sequence_warnings(&decl);
        assert_eq!(warnings.len(), 2, "{warnings:?}");
        assert!(warnings[0].contains("'README.md' is used more than once"));
        assert!(warnings[1].contains("guide depends on non-existent sequence number 7"));
    }
}
