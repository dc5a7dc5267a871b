//! Binder: parsed S-expressions → typed [`Case`] values.
//!
//! Section dispatch is a single exhaustive match over the recognized section
//! heads; unrecognized sections fall through one explicit arm and are
//! ignored for forward compatibility (they are not round-trip preserved).
//! Invariants that need the ontology or policy registry are left to the
//! validator.

use thiserror::Error;

use crate::ast::{CaseExpr, Expr};
use crate::model::{
    AttributeSource, Case, CaseFunction, CaseStatus, DocumentRef, DocumentRequirement,
    FunctionStatus, OwnershipNode,
};
use crate::parser::Dsl;

/// Structurally parseable input that cannot produce a typed case.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("case '{case}': malformed {section} section: {detail}")]
    Malformed {
        case: String,
        section: &'static str,
        detail: String,
    },
}

/// Bound cases plus non-fatal findings (e.g. malformed percents).
#[derive(Debug, Clone, PartialEq)]
pub struct BindResult {
    pub cases: Vec<Case>,
    pub warnings: Vec<String>,
}

/// Bind every case form in a parsed DSL.
pub fn bind(dsl: &Dsl) -> Result<BindResult, BindError> {
    let mut cases = Vec::with_capacity(dsl.cases.len());
    let mut warnings = Vec::new();
    for form in &dsl.cases {
        cases.push(bind_case(form, &mut warnings)?);
    }
    Ok(BindResult { cases, warnings })
}

fn bind_case(form: &CaseExpr, warnings: &mut Vec<String>) -> Result<Case, BindError> {
    let mut case = Case::new(form.name.clone());

    for section in &form.body {
        let Expr::Call(head, args) = section else {
            // Bare atoms in a case body carry no meaning; skip like any
            // unrecognized section.
            continue;
        };

        match head.as_str() {
            "nature-purpose" => bind_nature_purpose(&mut case, args)?,
            "client-business-unit" => {
                case.cbu_name = required_atom(&case.name, "client-business-unit", args.first())?;
            }
            "function" => {
                let name = required_atom(&case.name, "function", args.first())?;
                case.functions.push(CaseFunction {
                    name,
                    status: FunctionStatus::Pending,
                });
            }
            "policy" => {
                case.policies
                    .push(required_atom(&case.name, "policy", args.first())?);
            }
            "obligation" => {
                case.obligations
                    .push(required_atom(&case.name, "obligation", args.first())?);
            }
            "kyc-token" => {
                let label = required_atom(&case.name, "kyc-token", args.first())?;
                if let Some(status) = CaseStatus::from_label(&label) {
                    case.status = status;
                }
                case.token = Some(label);
            }
            "ownership-structure" => bind_ownership(&mut case, args, warnings)?,
            "data-dictionary" => bind_data_dictionary(&mut case, args)?,
            "document-requirements" => bind_document_requirements(&mut case, args)?,
            // Unknown sections are ignored: newer writers may emit forms this
            // binder does not know about.
            _ => {}
        }
    }

    Ok(case)
}

fn bind_nature_purpose(case: &mut Case, args: &[Expr]) -> Result<(), BindError> {
    for arg in args {
        match arg.head() {
            Some("nature") => {
                case.nature = required_atom(&case.name, "nature-purpose", arg.args().first())?;
            }
            Some("purpose") => {
                case.purpose = required_atom(&case.name, "nature-purpose", arg.args().first())?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn bind_ownership(
    case: &mut Case,
    args: &[Expr],
    warnings: &mut Vec<String>,
) -> Result<(), BindError> {
    for node in args {
        let Expr::Call(role, node_args) = node else {
            continue;
        };
        match role.as_str() {
            "entity" => {
                let name = required_atom(&case.name, "ownership-structure", node_args.first())?;
                case.ownership.push(OwnershipNode::Entity { name });
            }
            "owner" | "beneficial-owner" => {
                let name = required_atom(&case.name, "ownership-structure", node_args.first())?;
                let percent =
                    parse_percent(&case.name, node_args.get(1).and_then(Expr::as_atom), warnings);
                case.ownership.push(if role == "owner" {
                    OwnershipNode::Owner { name, percent }
                } else {
                    OwnershipNode::BeneficialOwner { name, percent }
                });
            }
            "controller" => {
                let name = required_atom(&case.name, "ownership-structure", node_args.first())?;
                let role_label = node_args
                    .get(1)
                    .and_then(Expr::as_atom)
                    .unwrap_or_default()
                    .to_string();
                case.ownership.push(OwnershipNode::Controller {
                    name,
                    role: role_label,
                });
            }
            _ => {}
        }
    }
    Ok(())
}

fn bind_data_dictionary(case: &mut Case, args: &[Expr]) -> Result<(), BindError> {
    for entry in args {
        let Expr::Call(head, entry_args) = entry else {
            continue;
        };
        if head != "attribute" {
            continue;
        }
        let attribute_code = required_atom(&case.name, "data-dictionary", entry_args.first())?;
        let mut source = AttributeSource {
            attribute_code,
            primary: None,
            secondary: None,
            tertiary: None,
        };
        for tier in &entry_args[1..] {
            let doc = tier
                .args()
                .iter()
                .find(|a| a.head() == Some("document"))
                .and_then(Expr::first_atom)
                .map(str::to_string);
            match tier.head() {
                Some("primary-source") => source.primary = doc,
                Some("secondary-source") => source.secondary = doc,
                Some("tertiary-source") => source.tertiary = doc,
                _ => {}
            }
        }
        case.data_dictionary.push(source);
    }
    Ok(())
}

fn bind_document_requirements(case: &mut Case, args: &[Expr]) -> Result<(), BindError> {
    let jurisdiction = args
        .iter()
        .find(|a| a.head() == Some("jurisdiction"))
        .and_then(Expr::first_atom)
        .ok_or_else(|| BindError::Malformed {
            case: case.name.clone(),
            section: "document-requirements",
            detail: "missing (jurisdiction CODE)".to_string(),
        })?
        .to_string();

    let mut documents = Vec::new();
    if let Some(required) = args.iter().find(|a| a.head() == Some("required")) {
        for doc in required.args() {
            if doc.head() != Some("document") {
                continue;
            }
            let code = required_atom(&case.name, "document-requirements", doc.args().first())?;
            let name = doc
                .args()
                .get(1)
                .and_then(Expr::as_atom)
                .unwrap_or_default()
                .to_string();
            documents.push(DocumentRef { code, name });
        }
    }

    case.document_requirements.push(DocumentRequirement {
        jurisdiction,
        documents,
    });
    Ok(())
}

fn required_atom(
    case: &str,
    section: &'static str,
    arg: Option<&Expr>,
) -> Result<String, BindError> {
    arg.and_then(Expr::as_atom)
        .map(str::to_string)
        .ok_or_else(|| BindError::Malformed {
            case: case.to_string(),
            section,
            detail: "expected an identifier or quoted string".to_string(),
        })
}

/// Percentages lose the trailing `%` and parse as floats; malformed values
/// bind as 0.0 with a warning rather than failing the whole case.
fn parse_percent(case: &str, raw: Option<&str>, warnings: &mut Vec<String>) -> f64 {
    let Some(raw) = raw else {
        warnings.push(format!("case '{case}': ownership node missing percent"));
        return 0.0;
    };
    let trimmed = raw.strip_suffix('%').unwrap_or(raw);
    match trimmed.parse::<f64>() {
        Ok(v) => v,
        Err(_) => {
            warnings.push(format!("case '{case}': malformed percent '{raw}'"));
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn bind_one(src: &str) -> Case {
        let result = bind(&parse(src).unwrap()).unwrap();
        assert_eq!(result.cases.len(), 1);
        result.cases.into_iter().next().unwrap()
    }

    #[test]
    fn binds_round_trip_reference_case() {
        let case = bind_one(
            r#"(kyc-case TEST (nature-purpose (nature "N") (purpose "P"))
              (client-business-unit C) (function DISCOVER-POLICIES)
              (policy POL-1) (obligation POL-1) (kyc-token "pending"))"#,
        );
        assert_eq!(case.name, "TEST");
        assert_eq!(case.nature, "N");
        assert_eq!(case.purpose, "P");
        assert_eq!(case.cbu_name, "C");
        assert_eq!(case.functions[0].name, "DISCOVER-POLICIES");
        assert_eq!(case.policies, vec!["POL-1"]);
        assert_eq!(case.obligations, vec!["POL-1"]);
        assert_eq!(case.token.as_deref(), Some("pending"));
        assert_eq!(case.status, CaseStatus::Pending);
    }

    #[test]
    fn token_label_drives_status() {
        let case = bind_one(r#"(kyc-case T (kyc-token "Approved"))"#);
        assert_eq!(case.status, CaseStatus::Approved);
        assert_eq!(case.token.as_deref(), Some("Approved"));
    }

    #[test]
    fn binds_ownership_nodes() {
        let case = bind_one(
            r#"(kyc-case T (ownership-structure
                (entity HOLDCO)
                (owner ACME 60%)
                (beneficial-owner SMITH 25.5%)
                (controller JONES "Director")))"#,
        );
        assert_eq!(
            case.ownership,
            vec![
                OwnershipNode::Entity { name: "HOLDCO".into() },
                OwnershipNode::Owner { name: "ACME".into(), percent: 60.0 },
                OwnershipNode::BeneficialOwner { name: "SMITH".into(), percent: 25.5 },
                OwnershipNode::Controller { name: "JONES".into(), role: "Director".into() },
            ]
        );
    }

    #[test]
    fn malformed_percent_warns_and_binds_zero() {
        let result = bind(
            &parse(r#"(kyc-case T (ownership-structure (owner ACME 6x%)))"#).unwrap(),
        )
        .unwrap();
        assert_eq!(
            result.cases[0].ownership,
            vec![OwnershipNode::Owner { name: "ACME".into(), percent: 0.0 }]
        );
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn binds_data_dictionary_tiers() {
        let case = bind_one(
            r#"(kyc-case T (data-dictionary
                (attribute UBO_NAME
                  (primary-source (document UBO-DECL))
                  (secondary-source (document PASSPORT)))))"#,
        );
        assert_eq!(
            case.data_dictionary,
            vec![AttributeSource {
                attribute_code: "UBO_NAME".into(),
                primary: Some("UBO-DECL".into()),
                secondary: Some("PASSPORT".into()),
                tertiary: None,
            }]
        );
    }

    #[test]
    fn binds_document_requirements() {
        let case = bind_one(
            r#"(kyc-case T (document-requirements
                (jurisdiction LU)
                (required (document UBO-DECL "UBO Declaration")
                          (document REG-EXTRACT "Registry Extract"))))"#,
        );
        assert_eq!(case.document_requirements.len(), 1);
        let group = &case.document_requirements[0];
        assert_eq!(group.jurisdiction, "LU");
        assert_eq!(group.documents[1].code, "REG-EXTRACT");
        assert_eq!(group.documents[1].name, "Registry Extract");
    }

    #[test]
    fn unknown_sections_are_ignored() {
        let case = bind_one(r#"(kyc-case T (future-section a b c) (policy POL-1))"#);
        assert_eq!(case.policies, vec!["POL-1"]);
    }

    #[test]
    fn unknown_function_action_binds_verbatim() {
        // Vocabulary membership is the validator's concern.
        let case = bind_one(r#"(kyc-case T (function UNKNOWN-ACTION))"#);
        assert_eq!(case.functions[0].name, "UNKNOWN-ACTION");
    }
}
