// If the HM0360 is not requested as the startup sensor, use the HM01B0
fn main() {
    if !cfg!(feature = "start-hm0360") {
        println!("cargo:rustc-cfg=feature=\"start-hm01b0\"");
    }
}
