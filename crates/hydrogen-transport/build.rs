fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Proto compilation is optional: a checkout without `protoc` still
    // builds the rest of the crate with the `grpc` feature simply
    // unavailable at runtime.
    std::fs::create_dir_all("src/proto").ok();

    let proto_path = "proto/hydrogen.proto";
    if std::path::Path::new(proto_path).exists() {
        match tonic_build::configure()
            .build_server(true)
            .build_client(true)
            .out_dir("src/proto")
            .compile(&[proto_path], &["proto"])
        {
            Ok(()) => println!("cargo:warning=hydrogen.proto compiled"),
            Err(e) => {
                println!("cargo:warning=hydrogen.proto compilation skipped: {e}");
                println!("cargo:warning=install protoc to enable the grpc transport");
            }
        }
    }

    Ok(())
}
