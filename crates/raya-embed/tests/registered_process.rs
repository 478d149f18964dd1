//! Process-wide registration
//!
//! Runs in its own test binary, so the process-wide host and gate start
//! untouched. Keep a single test here: anything else in this binary would
//! share the global state.

use std::sync::Arc;

use raya_embed::{listener, HostLoader, ModuleHost};
use raya_image::{ModuleIdentity, ModuleImage};

const SIMPLE_LIB: &str = "simple.lib, Version=1.0.0";

fn identity(text: &str) -> ModuleIdentity {
    text.parse().expect("valid identity")
}

#[test]
fn test_register_installs_exactly_one_listener() {
    let host = ModuleHost::global();
    assert!(!raya_embed::is_registered());

    // The process has a listener of its own before registration.
    host.subscribe(listener(|_, _| Ok(None))).unwrap();
    assert_eq!(host.listener_count(), 1);

    let barrier = Arc::new(std::sync::Barrier::new(8));
    std::thread::scope(|s| {
        for _ in 0..8 {
            let barrier = barrier.clone();
            s.spawn(move || {
                barrier.wait();
                for _ in 0..4 {
                    raya_embed::register().unwrap();
                }
            });
        }
    });

    assert!(raya_embed::is_registered());
    assert_eq!(host.listener_count(), 2);

    raya_embed::register().unwrap();
    host.subscribe(listener(|_, _| Ok(None))).unwrap();
    assert_eq!(host.listener_count(), 3);

    // Registered resolution serves bundled dependencies.
    let lib = ModuleImage::new(identity(SIMPLE_LIB)).encode();
    let program = ModuleImage::new(identity("program, Version=1.0.0"))
        .embed("simple.lib.rym", lib.clone())
        .encode();
    host.load(&program).unwrap();

    let module = host.resolve(SIMPLE_LIB).expect("bundled module");
    assert_eq!(module.image(), &lib[..]);
    assert!(host.is_loaded(&identity(SIMPLE_LIB)));
}
