//! Deterministic serializer: typed cases → canonical DSL text.
//!
//! Sections are emitted in a fixed order (`nature-purpose`,
//! `client-business-unit`, `policy*`, `obligation*`, `function*`,
//! `kyc-token`, then the structured sections in grammar order) so that
//! serializing the same case always produces byte-identical text — the
//! snapshot hash in the case store depends on this. Strings are
//! double-quoted without escape processing; inputs containing `"` are not
//! expected to round-trip.

use crate::model::{Case, OwnershipNode};

/// Serialize cases to canonical DSL text. Successive cases are separated by
/// two blank lines.
pub fn serialize(cases: &[Case]) -> String {
    let blocks: Vec<String> = cases.iter().map(serialize_case).collect();
    let mut out = blocks.join("\n\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

fn serialize_case(case: &Case) -> String {
    let mut out = format!("(kyc-case {}", case.name);

    if !case.nature.is_empty() || !case.purpose.is_empty() {
        out.push_str("\n  (nature-purpose");
        out.push_str(&format!("\n    (nature \"{}\")", case.nature));
        out.push_str(&format!("\n    (purpose \"{}\"))", case.purpose));
    }

    if !case.cbu_name.is_empty() {
        out.push_str(&format!("\n  (client-business-unit {})", case.cbu_name));
    }

    for policy in &case.policies {
        out.push_str(&format!("\n  (policy {policy})"));
    }

    for obligation in &case.obligations {
        out.push_str(&format!("\n  (obligation {obligation})"));
    }

    for function in &case.functions {
        out.push_str(&format!("\n  (function {})", function.name));
    }

    if let Some(token) = &case.token {
        out.push_str(&format!("\n  (kyc-token \"{token}\")"));
    }

    if !case.ownership.is_empty() {
        out.push_str("\n  (ownership-structure");
        for node in &case.ownership {
            out.push_str(&serialize_ownership_node(node));
        }
        out.push(')');
    }

    if !case.data_dictionary.is_empty() {
        out.push_str("\n  (data-dictionary");
        for entry in &case.data_dictionary {
            out.push_str(&format!("\n    (attribute {}", entry.attribute_code));
            for (tier, doc) in [
                ("primary-source", &entry.primary),
                ("secondary-source", &entry.secondary),
                ("tertiary-source", &entry.tertiary),
            ] {
                if let Some(code) = doc {
                    out.push_str(&format!("\n      ({tier} (document {code}))"));
                }
            }
            out.push(')');
        }
        out.push(')');
    }

    for group in &case.document_requirements {
        out.push_str("\n  (document-requirements");
        out.push_str(&format!("\n    (jurisdiction {})", group.jurisdiction));
        out.push_str("\n    (required");
        for doc in &group.documents {
            out.push_str(&format!("\n      (document {} \"{}\")", doc.code, doc.name));
        }
        out.push_str("))");
    }

    out.push(')');
    out
}

fn serialize_ownership_node(node: &OwnershipNode) -> String {
    match node {
        OwnershipNode::Entity { name } => format!("\n    (entity {name})"),
        OwnershipNode::Owner { name, percent } => {
            format!("\n    (owner {name} {}%)", format_percent(*percent))
        }
        OwnershipNode::BeneficialOwner { name, percent } => {
            format!("\n    (beneficial-owner {name} {}%)", format_percent(*percent))
        }
        OwnershipNode::Controller { name, role } => {
            format!("\n    (controller {name} \"{role}\")")
        }
    }
}

/// Shortest float form; `60` and `25.5` both re-parse to the same value.
fn format_percent(percent: f64) -> String {
    format!("{percent}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::bind;
    use crate::model::{CaseStatus, FunctionAction};
    use crate::parser::parse;

    const REFERENCE: &str = r#"(kyc-case TEST (nature-purpose (nature "N") (purpose "P"))
  (client-business-unit C) (function DISCOVER-POLICIES)
  (policy POL-1) (obligation POL-1) (kyc-token "pending"))"#;

    #[test]
    fn round_trip_is_stable() {
        let bound = bind(&parse(REFERENCE).unwrap()).unwrap();
        let text = serialize(&bound.cases);
        let rebound = bind(&parse(&text).unwrap()).unwrap();
        assert_eq!(bound.cases, rebound.cases);

        // A second serialization must be byte-identical.
        assert_eq!(text, serialize(&rebound.cases));
    }

    #[test]
    fn sections_are_emitted_in_fixed_order() {
        // Input order deliberately scrambled.
        let src = r#"(kyc-case T (kyc-token "pending") (policy P-1)
            (client-business-unit C) (function ASSESS-RISK)
            (nature-purpose (nature "N") (purpose "P")) (obligation P-1))"#;
        let bound = bind(&parse(src).unwrap()).unwrap();
        let text = serialize(&bound.cases);

        let order = [
            "nature-purpose",
            "client-business-unit",
            "(policy",
            "(obligation",
            "(function",
            "kyc-token",
        ];
        let positions: Vec<usize> = order.iter().map(|s| text.find(s).unwrap()).collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted, "section order drifted:\n{text}");
    }

    #[test]
    fn two_blank_lines_between_cases() {
        let mut a = crate::model::Case::new("A");
        a.set_status(CaseStatus::Pending);
        let mut b = crate::model::Case::new("B");
        b.set_status(CaseStatus::Pending);
        let text = serialize(&[a, b]);
        assert!(text.contains(")\n\n\n(kyc-case B"), "got:\n{text}");
    }

    #[test]
    fn ownership_and_structured_sections_round_trip() {
        let src = r#"(kyc-case T
            (nature-purpose (nature "N") (purpose "P"))
            (client-business-unit C)
            (kyc-token "review")
            (ownership-structure (entity H) (owner A 60%) (beneficial-owner B 12.25%)
                                 (controller X "Chair"))
            (data-dictionary (attribute UBO_NAME (primary-source (document UBO-DECL))))
            (document-requirements (jurisdiction LU)
              (required (document UBO-DECL "UBO Declaration"))))"#;
        let bound = bind(&parse(src).unwrap()).unwrap();
        let rebound = bind(&parse(&serialize(&bound.cases)).unwrap()).unwrap();
        assert_eq!(bound.cases, rebound.cases);
    }

    #[test]
    fn amended_case_serializes_added_function() {
        let mut case = bind(&parse(REFERENCE).unwrap()).unwrap().cases.remove(0);
        case.add_function(FunctionAction::SolicitDocuments);
        let text = serialize(std::slice::from_ref(&case));
        assert!(text.contains("(function SOLICIT-DOCUMENTS)"));
    }
}
