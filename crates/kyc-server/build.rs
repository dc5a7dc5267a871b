fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = std::path::PathBuf::from(std::env::var("OUT_DIR")?);

    tonic_build::configure()
        .build_server(true)
        .build_client(false)
        .file_descriptor_set_path(out_dir.join("kyc_descriptor.bin"))
        .extern_path(".google.protobuf.Timestamp", "::prost_types::Timestamp")
        .compile_protos(
            &[
                "../../proto/kyc_dsl.proto",
                "../../proto/kyc_data.proto",
                "../../proto/kyc_ontology.proto",
                "../../proto/kyc_cbu.proto",
                "../../proto/kyc_rag.proto",
            ],
            &["../../proto"],
        )?;

    println!("cargo:rerun-if-changed=../../proto");

    Ok(())
}
