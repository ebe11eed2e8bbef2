//! Generates the `calc.Calculator` gRPC server and client.
//!
//! The service is described in Rust rather than a `.proto` file so the build
//! does not need `protoc`. Message types live in `src/dispatch/proto.rs`.

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let get_task = tonic_build::manual::Method::builder()
        .name("get_task")
        .route_name("GetTask")
        .input_type("crate::dispatch::proto::TaskRequest")
        .output_type("crate::dispatch::proto::TaskResponse")
        .codec_path("tonic::codec::ProstCodec")
        .build();

    let submit_result = tonic_build::manual::Method::builder()
        .name("submit_result")
        .route_name("SubmitResult")
        .input_type("crate::dispatch::proto::ResultRequest")
        .output_type("crate::dispatch::proto::ResultResponse")
        .codec_path("tonic::codec::ProstCodec")
        .build();

    let calculator = tonic_build::manual::Service::builder()
        .name("Calculator")
        .package("calc")
        .method(get_task)
        .method(submit_result)
        .build();

    tonic_build::manual::Builder::new().compile(&[calculator]);
}
