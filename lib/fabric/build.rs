fn main() -> Result<(), Box<dyn std::error::Error>> {
    let proto_dir = "proto";
    let protos = [
        "proto/common/common.proto",
        "proto/msp/identities.proto",
        "proto/peer/chaincode.proto",
        "proto/peer/proposal.proto",
        "proto/peer/proposal_response.proto",
        "proto/peer/transaction.proto",
        "proto/gateway/gateway.proto",
        "proto/google/rpc/status.proto",
    ];

    println!("cargo:rerun-if-changed={}", proto_dir);
    for proto in &protos {
        println!("cargo:rerun-if-changed={}", proto);
    }

    // The server half backs the in-process gateway used by the transport tests
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&protos, &[proto_dir])?;
    Ok(())
}
