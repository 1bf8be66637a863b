// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

fn main() {
    // Get protoc path
    let protoc_path = protoc_bin_vendored::protoc_bin_path().unwrap();

    // export PROTOC to the environment
    unsafe {
        #[allow(clippy::disallowed_methods)]
        std::env::set_var("PROTOC", protoc_path);
    }

    // The canonical sources are this crate's proto/v1/{gnmi,phaldb}.proto.
    // Generated files land in src/api/gen/ so the api module can include!
    // them by a stable relative path. When building from a published package
    // without the proto sources, the pre-generated files are used as-is and
    // this build script skips proto compilation.
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();
    let proto_dir = std::path::Path::new(&manifest_dir).join("proto/v1");
    let gnmi_proto = proto_dir.join("gnmi.proto");
    let phaldb_proto = proto_dir.join("phaldb.proto");

    if !gnmi_proto.exists() || !phaldb_proto.exists() {
        // Published package: rely on the pre-generated src/api/gen/ files.
        return;
    }

    println!("cargo:rerun-if-changed={}", gnmi_proto.display());
    println!("cargo:rerun-if-changed={}", phaldb_proto.display());

    let out_dir = std::path::Path::new(&manifest_dir).join("src/api/gen");
    std::fs::create_dir_all(&out_dir).unwrap();

    tonic_prost_build::configure()
        .out_dir(&out_dir)
        .compile_protos(
            &[gnmi_proto.to_str().unwrap(), phaldb_proto.to_str().unwrap()],
            &[proto_dir.to_str().unwrap()],
        )
        .unwrap();
}
