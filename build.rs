fn main() {
    println!("cargo:rerun-if-env-changed=DISPENSER_WIFI_SSID");
    println!("cargo:rerun-if-env-changed=DISPENSER_WIFI_PASSWORD");

    // Host-side test builds run without the ESP-IDF toolchain.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
