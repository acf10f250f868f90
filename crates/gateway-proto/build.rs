fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/gateway.proto");

    tonic_build::configure()
        .format(true)
        .build_client(true)
        .build_server(true)
        .compile(&["proto/gateway.proto"], &["proto"])?;

    Ok(())
}
