#![no_main]

use glr::{ClassLoader, LoaderConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(loader) = ClassLoader::new(LoaderConfig::default()) {
        if let Ok(class) = loader.load_class(data) {
            let name = class.name().to_string();
            assert!(loader.find_class(&name).is_some());
        }
    }
});
