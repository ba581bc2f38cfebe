#![no_main]
use irrigation_core::{ConfigPatch, ConfigStore, RuntimeConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let Ok(change) = irrigation_config::load_change_toml(data) else {
        return;
    };
    let base = RuntimeConfig::from(&irrigation_config::Config::default());
    let Ok(store) = ConfigStore::new(base) else {
        return;
    };
    let before = store.snapshot();
    match store.apply(&ConfigPatch::from(&change)) {
        Ok(next) => assert!(next.validate().is_ok()),
        Err(_) => assert_eq!(*store.snapshot(), *before),
    }
});
