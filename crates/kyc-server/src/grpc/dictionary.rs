//! `kyc.data.DictionaryService` implementation over the in-memory catalog.

use tonic::{Request, Response, Status};

use kyc_ontology::{Attribute, Document};
use kyc_rag::retrieval::clamp_limit;

use crate::proto::kyc::data::dictionary_service_server::DictionaryService;
use crate::proto::kyc::data::*;
use crate::state::AppState;

use super::{ontology_status, require};

pub struct DictionaryGrpc {
    state: AppState,
}

impl DictionaryGrpc {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

fn attribute_record(a: &Attribute) -> AttributeRecord {
    AttributeRecord {
        code: a.code.clone(),
        name: a.name.clone(),
        domain: a.domain.clone(),
        description: a.description.clone(),
        risk_category: a.risk_category.clone(),
        is_personal_data: a.is_personal_data,
        attribute_class: a.attribute_class.as_str().to_string(),
    }
}

fn document_record(d: &Document) -> DocumentRecord {
    DocumentRecord {
        code: d.code.clone(),
        name: d.name.clone(),
        domain: d.domain.clone(),
        jurisdiction: d.jurisdiction.clone(),
        regulation_code: d.regulation_code.clone(),
        source_type: d.source_type.as_str().to_string(),
        validity_years: d.validity_years,
        description: d.description.clone(),
    }
}

#[tonic::async_trait]
impl DictionaryService for DictionaryGrpc {
    async fn get_attribute(
        &self,
        request: Request<GetAttributeRequest>,
    ) -> Result<Response<AttributeRecord>, Status> {
        let req = request.into_inner();
        require("code", &req.code)?;
        let attribute = self
            .state
            .catalog
            .get_attribute(&req.code)
            .map_err(ontology_status)?;
        Ok(Response::new(attribute_record(attribute)))
    }

    async fn list_attributes(
        &self,
        request: Request<ListAttributesRequest>,
    ) -> Result<Response<ListAttributesResponse>, Status> {
        let req = request.into_inner();
        let limit = clamp_limit(Some(req.limit as i64)) as usize;
        let offset = req.offset.max(0) as usize;

        let all: Vec<&Attribute> = self.state.catalog.list_attributes().collect();
        let attributes = all
            .iter()
            .skip(offset)
            .take(limit)
            .map(|a| attribute_record(a))
            .collect();

        Ok(Response::new(ListAttributesResponse {
            attributes,
            total: all.len() as i32,
        }))
    }

    async fn get_document(
        &self,
        request: Request<GetDocumentRequest>,
    ) -> Result<Response<DocumentRecord>, Status> {
        let req = request.into_inner();
        require("code", &req.code)?;
        let document = self
            .state
            .catalog
            .get_document(&req.code)
            .map_err(ontology_status)?;
        Ok(Response::new(document_record(document)))
    }

    async fn list_documents(
        &self,
        request: Request<ListDocumentsRequest>,
    ) -> Result<Response<ListDocumentsResponse>, Status> {
        let req = request.into_inner();
        let limit = clamp_limit(Some(req.limit as i64)) as usize;
        let offset = req.offset.max(0) as usize;

        let all: Vec<&Document> = self
            .state
            .catalog
            .list_documents()
            .filter(|d| req.jurisdiction.is_empty() || d.jurisdiction == req.jurisdiction)
            .collect();
        let documents = all
            .iter()
            .skip(offset)
            .take(limit)
            .map(|d| document_record(d))
            .collect();

        Ok(Response::new(ListDocumentsResponse {
            documents,
            total: all.len() as i32,
        }))
    }
}
