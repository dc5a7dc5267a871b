//! `kyc.ontology.OntologyService` implementation.

use tonic::{Request, Response, Status};

use kyc_ontology::{Attribute, Document, OntologyError};

use crate::proto::kyc::ontology::ontology_service_server::OntologyService;
use crate::proto::kyc::ontology::*;
use crate::state::AppState;

use super::{ontology_status, require};

pub struct OntologyGrpc {
    state: AppState,
}

impl OntologyGrpc {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

fn regulation_record(r: &kyc_ontology::Regulation) -> RegulationRecord {
    RegulationRecord {
        code: r.code.clone(),
        name: r.name.clone(),
        jurisdiction: r.jurisdiction.clone(),
        authority: r.authority.clone(),
        description: r.description.clone(),
        effective_from: r.effective_from.map(|d| d.to_string()).unwrap_or_default(),
        effective_to: r.effective_to.map(|d| d.to_string()).unwrap_or_default(),
    }
}

fn ontology_document(d: &Document) -> OntologyDocument {
    OntologyDocument {
        code: d.code.clone(),
        name: d.name.clone(),
        domain: d.domain.clone(),
        jurisdiction: d.jurisdiction.clone(),
        regulation_code: d.regulation_code.clone(),
        source_type: d.source_type.as_str().to_string(),
        validity_years: d.validity_years,
    }
}

fn ontology_attribute(a: &Attribute) -> OntologyAttribute {
    OntologyAttribute {
        code: a.code.clone(),
        name: a.name.clone(),
        domain: a.domain.clone(),
        risk_category: a.risk_category.clone(),
        is_personal_data: a.is_personal_data,
        attribute_class: a.attribute_class.as_str().to_string(),
    }
}

#[tonic::async_trait]
impl OntologyService for OntologyGrpc {
    async fn list_regulations(
        &self,
        _request: Request<ListRegulationsRequest>,
    ) -> Result<Response<ListRegulationsResponse>, Status> {
        Ok(Response::new(ListRegulationsResponse {
            regulations: self
                .state
                .catalog
                .list_regulations()
                .map(regulation_record)
                .collect(),
        }))
    }

    async fn get_regulation(
        &self,
        request: Request<GetRegulationRequest>,
    ) -> Result<Response<RegulationRecord>, Status> {
        let req = request.into_inner();
        require("code", &req.code)?;
        let regulation = self
            .state
            .catalog
            .get_regulation(&req.code)
            .map_err(ontology_status)?;
        Ok(Response::new(regulation_record(regulation)))
    }

    async fn list_documents_by_regulation(
        &self,
        request: Request<RegulationCodeRequest>,
    ) -> Result<Response<DocumentListResponse>, Status> {
        let req = request.into_inner();
        require("regulation_code", &req.regulation_code)?;
        // Surface unknown regulations as NotFound rather than an empty list.
        self.state
            .catalog
            .get_regulation(&req.regulation_code)
            .map_err(ontology_status)?;
        Ok(Response::new(DocumentListResponse {
            documents: self
                .state
                .catalog
                .list_documents_by_regulation(&req.regulation_code)
                .into_iter()
                .map(ontology_document)
                .collect(),
        }))
    }

    async fn get_documents_for_attribute(
        &self,
        request: Request<AttributeCodeRequest>,
    ) -> Result<Response<AttributeDocumentsResponse>, Status> {
        let req = request.into_inner();
        require("attribute_code", &req.attribute_code)?;
        self.state
            .catalog
            .get_attribute(&req.attribute_code)
            .map_err(ontology_status)?;
        Ok(Response::new(AttributeDocumentsResponse {
            documents: self
                .state
                .catalog
                .get_documents_for_attribute(&req.attribute_code)
                .into_iter()
                .map(|(document, tier)| TieredDocument {
                    document: Some(ontology_document(document)),
                    source_tier: tier.as_str().to_string(),
                })
                .collect(),
        }))
    }

    async fn get_attributes_for_document(
        &self,
        request: Request<DocumentCodeRequest>,
    ) -> Result<Response<AttributeListResponse>, Status> {
        let req = request.into_inner();
        require("document_code", &req.document_code)?;
        self.state
            .catalog
            .get_document(&req.document_code)
            .map_err(ontology_status)?;
        Ok(Response::new(AttributeListResponse {
            attributes: self
                .state
                .catalog
                .get_attributes_for_document(&req.document_code)
                .into_iter()
                .map(ontology_attribute)
                .collect(),
        }))
    }

    async fn get_document_sources(
        &self,
        request: Request<AttributeCodeRequest>,
    ) -> Result<Response<DocumentSourcesResponse>, Status> {
        let req = request.into_inner();
        require("attribute_code", &req.attribute_code)?;
        self.state
            .catalog
            .get_attribute(&req.attribute_code)
            .map_err(ontology_status)?;
        Ok(Response::new(DocumentSourcesResponse {
            links: self
                .state
                .catalog
                .get_document_sources(&req.attribute_code)
                .into_iter()
                .map(|link| DocumentSourceLink {
                    attribute_code: link.attribute_code.clone(),
                    document_code: link.document_code.clone(),
                    source_tier: link.source_tier.as_str().to_string(),
                    is_mandatory: link.is_mandatory,
                    jurisdiction: link.jurisdiction.clone(),
                    regulation_code: link.regulation_code.clone(),
                    relevance_score: link.relevance_score,
                })
                .collect(),
        }))
    }

    async fn get_document_regulation_links(
        &self,
        request: Request<DocumentCodeRequest>,
    ) -> Result<Response<DocumentRegulationLinksResponse>, Status> {
        let req = request.into_inner();
        require("document_code", &req.document_code)?;
        self.state
            .catalog
            .get_document(&req.document_code)
            .map_err(ontology_status)?;
        Ok(Response::new(DocumentRegulationLinksResponse {
            links: self
                .state
                .catalog
                .get_document_regulation_links(&req.document_code)
                .into_iter()
                .map(|link| DocumentRegulationLink {
                    document_code: link.document_code.clone(),
                    regulation_code: link.regulation_code.clone(),
                    applicability: link.applicability.clone(),
                    jurisdiction: link.jurisdiction.clone(),
                })
                .collect(),
        }))
    }

    async fn list_public_attributes(
        &self,
        _request: Request<ListAttributesByClassRequest>,
    ) -> Result<Response<AttributeListResponse>, Status> {
        Ok(Response::new(AttributeListResponse {
            attributes: self
                .state
                .catalog
                .list_public_attributes()
                .into_iter()
                .map(ontology_attribute)
                .collect(),
        }))
    }

    async fn list_private_attributes(
        &self,
        _request: Request<ListAttributesByClassRequest>,
    ) -> Result<Response<AttributeListResponse>, Status> {
        Ok(Response::new(AttributeListResponse {
            attributes: self
                .state
                .catalog
                .list_private_attributes()
                .into_iter()
                .map(ontology_attribute)
                .collect(),
        }))
    }

    async fn get_attribute_derivations(
        &self,
        request: Request<AttributeCodeRequest>,
    ) -> Result<Response<DerivationsResponse>, Status> {
        let req = request.into_inner();
        require("attribute_code", &req.attribute_code)?;
        self.state
            .catalog
            .get_attribute(&req.attribute_code)
            .map_err(ontology_status)?;
        Ok(Response::new(DerivationsResponse {
            derivations: self
                .state
                .catalog
                .get_attribute_derivations(&req.attribute_code)
                .into_iter()
                .map(|d| AttributeDerivation {
                    derived_code: d.derived_code.clone(),
                    source_code: d.source_code.clone(),
                    rule_expression: d.rule_expression.clone(),
                    rule_type: d.rule_type.clone(),
                    description: d.description.clone(),
                })
                .collect(),
        }))
    }

    async fn validate_derivation_sources(
        &self,
        request: Request<ValidateDerivationSourcesRequest>,
    ) -> Result<Response<ValidateDerivationSourcesResponse>, Status> {
        let req = request.into_inner();
        if req.source_codes.is_empty() {
            return Err(Status::invalid_argument("source_codes is required"));
        }
        match self.state.catalog.validate_derivation_sources(&req.source_codes) {
            Ok(()) => Ok(Response::new(ValidateDerivationSourcesResponse {
                valid: true,
                message: "all sources are public attributes".to_string(),
            })),
            Err(e @ (OntologyError::UnknownAttribute(_) | OntologyError::NonPublicSource(_))) => {
                Ok(Response::new(ValidateDerivationSourcesResponse {
                    valid: false,
                    message: e.to_string(),
                }))
            }
            Err(e) => Err(ontology_status(e)),
        }
    }
}
