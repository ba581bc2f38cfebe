#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = irrigation_config::load_toml(data) {
        if cfg.validate().is_ok() {
            // A validated file must map to a runtime config the core accepts.
            let runtime = irrigation_core::RuntimeConfig::from(&cfg);
            let _ = runtime.validate();
        }
    }
});
