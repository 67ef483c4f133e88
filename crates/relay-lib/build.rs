//! Build script for the watcher wire definitions
//!
//! Regenerates Rust code from the protobuf definitions when protoc is
//! available. The types committed in src/proto/mod.rs are the fallback, so
//! a missing protoc never breaks the build.

use std::path::Path;
use std::process::Command;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Re-run if the proto file changes
    println!("cargo:rerun-if-changed=../../proto/relay/v1/relay.proto");

    let proto_path = Path::new("../../proto/relay/v1/relay.proto");
    if !proto_path.exists() {
        println!("cargo:warning=Proto file not found, using pre-defined types in src/proto/mod.rs");
        return Ok(());
    }

    let protoc_available =
        std::env::var("PROTOC").is_ok() || Command::new("protoc").arg("--version").output().is_ok();

    if !protoc_available {
        println!("cargo:warning=protoc not found, using pre-defined types in src/proto/mod.rs");
        return Ok(());
    }

    // Generation is optional - the types are already defined in
    // src/proto/mod.rs. Uncomment below to regenerate from the .proto file.
    /*
    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .out_dir(&out_dir)
        .compile(&["../../proto/relay/v1/relay.proto"], &["../../proto"])?;
    */

    Ok(())
}
