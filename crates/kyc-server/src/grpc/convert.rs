//! Conversions between the typed case model and the wire messages.

use chrono::{DateTime, Utc};

use kyc_dsl_core::model::{
    AttributeSource, Case, CaseFunction, CaseStatus, DocumentRef, DocumentRequirement,
    FunctionStatus, OwnershipNode,
};

use crate::proto::kyc::dsl as pb;

pub fn timestamp(dt: DateTime<Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: dt.timestamp(),
        nanos: dt.timestamp_subsec_nanos() as i32,
    }
}

pub fn case_to_proto(case: &Case) -> pb::ParsedCase {
    pb::ParsedCase {
        name: case.name.clone(),
        nature: case.nature.clone(),
        purpose: case.purpose.clone(),
        client_business_unit: case.cbu_name.clone(),
        status: case.status.token_label().to_string(),
        kyc_token: case.token.clone().unwrap_or_default(),
        policies: case.policies.clone(),
        obligations: case.obligations.clone(),
        functions: case
            .functions
            .iter()
            .map(|f| pb::ParsedFunction {
                name: f.name.clone(),
                status: match f.status {
                    FunctionStatus::Pending => "pending".to_string(),
                    FunctionStatus::Complete => "complete".to_string(),
                },
            })
            .collect(),
        ownership: case.ownership.iter().map(ownership_to_proto).collect(),
        data_dictionary: case
            .data_dictionary
            .iter()
            .map(|s| pb::AttributeSource {
                attribute_code: s.attribute_code.clone(),
                primary: s.primary.clone().unwrap_or_default(),
                secondary: s.secondary.clone().unwrap_or_default(),
                tertiary: s.tertiary.clone().unwrap_or_default(),
            })
            .collect(),
        document_requirements: case
            .document_requirements
            .iter()
            .map(|g| pb::DocumentRequirement {
                jurisdiction: g.jurisdiction.clone(),
                documents: g
                    .documents
                    .iter()
                    .map(|d| pb::DocumentRef {
                        code: d.code.clone(),
                        name: d.name.clone(),
                    })
                    .collect(),
            })
            .collect(),
        version: case.version,
    }
}

fn ownership_to_proto(node: &OwnershipNode) -> pb::OwnershipNode {
    match node {
        OwnershipNode::Entity { name } => pb::OwnershipNode {
            kind: "entity".to_string(),
            name: name.clone(),
            percent: 0.0,
            role: String::new(),
        },
        OwnershipNode::Owner { name, percent } => pb::OwnershipNode {
            kind: "owner".to_string(),
            name: name.clone(),
            percent: *percent,
            role: String::new(),
        },
        OwnershipNode::BeneficialOwner { name, percent } => pb::OwnershipNode {
            kind: "beneficial-owner".to_string(),
            name: name.clone(),
            percent: *percent,
            role: String::new(),
        },
        OwnershipNode::Controller { name, role } => pb::OwnershipNode {
            kind: "controller".to_string(),
            name: name.clone(),
            percent: 0.0,
            role: role.clone(),
        },
    }
}

pub fn case_from_proto(pc: pb::ParsedCase) -> Case {
    let status = CaseStatus::from_label(&pc.status)
        .or_else(|| CaseStatus::from_label(&pc.kyc_token))
        .unwrap_or_default();
    Case {
        name: pc.name,
        nature: pc.nature,
        purpose: pc.purpose,
        cbu_name: pc.client_business_unit,
        status,
        last_updated: None,
        version: pc.version,
        policies: pc.policies,
        obligations: pc.obligations,
        functions: pc
            .functions
            .into_iter()
            .map(|f| CaseFunction {
                name: f.name,
                status: FunctionStatus::Pending,
            })
            .collect(),
        ownership: pc.ownership.into_iter().filter_map(ownership_from_proto).collect(),
        data_dictionary: pc
            .data_dictionary
            .into_iter()
            .map(|s| AttributeSource {
                attribute_code: s.attribute_code,
                primary: non_empty(s.primary),
                secondary: non_empty(s.secondary),
                tertiary: non_empty(s.tertiary),
            })
            .collect(),
        document_requirements: pc
            .document_requirements
            .into_iter()
            .map(|g| DocumentRequirement {
                jurisdiction: g.jurisdiction,
                documents: g
                    .documents
                    .into_iter()
                    .map(|d| DocumentRef {
                        code: d.code,
                        name: d.name,
                    })
                    .collect(),
            })
            .collect(),
        token: non_empty(pc.kyc_token),
    }
}

fn ownership_from_proto(node: pb::OwnershipNode) -> Option<OwnershipNode> {
    match node.kind.as_str() {
        "entity" => Some(OwnershipNode::Entity { name: node.name }),
        "owner" => Some(OwnershipNode::Owner {
            name: node.name,
            percent: node.percent,
        }),
        "beneficial-owner" => Some(OwnershipNode::BeneficialOwner {
            name: node.name,
            percent: node.percent,
        }),
        "controller" => Some(OwnershipNode::Controller {
            name: node.name,
            role: node.role,
        }),
        _ => None,
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kyc_dsl_core::binder::bind;
    use kyc_dsl_core::parser::parse;

    #[test]
    fn case_round_trips_through_proto() {
        let src = r#"(kyc-case TEST (nature-purpose (nature "N") (purpose "P"))
            (client-business-unit C) (function DISCOVER-POLICIES)
            (policy POL-1) (obligation POL-1) (kyc-token "pending")
            (ownership-structure (entity H) (owner A 60%))
            (data-dictionary (attribute UBO_NAME (primary-source (document UBO-DECL))))
            (document-requirements (jurisdiction LU)
              (required (document UBO-DECL "UBO Declaration"))))"#;
        let case = bind(&parse(src).unwrap()).unwrap().cases.remove(0);
        let round_tripped = case_from_proto(case_to_proto(&case));
        assert_eq!(case, round_tripped);
    }
}
