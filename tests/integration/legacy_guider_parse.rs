//! Spec §8 scenario 6: legacy ASCII guider protocol lines parse into typed
//! EVENT messages with the right `details` fields.

use hydrogen_message::{parse_legacy_guider_line, Message};
use serde_json::Value;

#[tokio::test]
async fn status_line_parses_into_event_details() {
    let msg = parse_legacy_guider_line("status:guiding,1,0.35,0.90\n", "guider1").unwrap();
    let Message::Event(event) = &msg else { panic!("expected event") };
    assert_eq!(event.event, "status");
    assert_eq!(msg.envelope().device_id, "guider1");
    assert_eq!(event.details.get("state"), Some(&Value::String("guiding".into())));
    assert_eq!(event.details.get("calibrated"), Some(&Value::Bool(true)));
}

#[tokio::test]
async fn correction_line_parses_ra_dec() {
    let msg = parse_legacy_guider_line("correction:0.12,-0.45", "guider1").unwrap();
    let Message::Event(event) = &msg else { panic!("expected event") };
    assert_eq!(event.details.get("ra").and_then(Value::as_f64), Some(0.12));
    assert_eq!(event.details.get("dec").and_then(Value::as_f64), Some(-0.45));
}

#[tokio::test]
async fn unknown_command_is_rejected() {
    let result = parse_legacy_guider_line("nonsense:1,2", "guider1");
    assert!(result.is_err());
}
