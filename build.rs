fn main() {
    tonic_build::compile_protos("proto/coffeeshop.proto")
        .unwrap_or_else(|e| panic!("Failed to compile coffeeshop.proto {:?}", e));
}
