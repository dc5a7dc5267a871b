//! Generated protobuf code.

// Suppress warnings from generated code.
#[allow(dead_code, unused_imports, clippy::all)]
pub mod kyc {
    pub mod dsl {
        tonic::include_proto!("kyc.dsl");
    }
    pub mod data {
        tonic::include_proto!("kyc.data");
    }
    pub mod ontology {
        tonic::include_proto!("kyc.ontology");
    }
    pub mod cbu {
        tonic::include_proto!("kyc.cbu");
    }
    pub mod rag {
        tonic::include_proto!("kyc.rag");
    }
}

/// Descriptor set for gRPC server reflection.
pub const FILE_DESCRIPTOR_SET: &[u8] =
    tonic::include_file_descriptor_set!("kyc_descriptor");
