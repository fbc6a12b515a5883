#![no_main]
use libfuzzer_sys::fuzz_target;
use surplus_manager::events::ItemEvent;
use surplus_manager::value::ItemValue;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Text parsing never fails and coercion never yields a non-finite number
    if let Ok(value) = text.parse::<ItemValue>() {
        if let Some(v) = value.to_decimal() {
            assert!(v.is_finite());
        }
        let _ = value.to_string().parse::<ItemValue>();
    }

    // Feed lines are untrusted JSON
    let _ = serde_json::from_str::<ItemEvent>(text);
});
