#![no_main]

use std::cell::RefCell;
use std::rc::Rc;

use callstream_core::{CallConfig, CallSnapshot, CallView, CallViewOptions};
use callstream_reactive::StreamCache;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(snapshot) = serde_json::from_str::<CallSnapshot>(text) else {
        return;
    };
    let cache = Rc::new(RefCell::new(StreamCache::new()));
    let view = CallView::new(CallViewOptions::default(), CallConfig::default(), cache);
    let first = view.evaluate(&snapshot);
    let again = view.evaluate(&snapshot);
    assert_eq!(first.version(), again.version());
    let _ = first.get().kind();
    view.dispose();
});
