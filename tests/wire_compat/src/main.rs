fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use fte_protocol::messages::{ActionEvent, HealthStatus, ModuleState, Severity};
    use fte_protocol::{ContentType, Envelope, MessageType};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture file as text.
    fn load_fixture(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Normalizes JSON values so that integer-valued floats compare equal.
    ///
    /// The bridge publishes whole-number floats such as `score` as `1`, Rust
    /// serializes `f64` as `1.0`.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => {
                if let Some(f) = n.as_f64() {
                    serde_json::json!(f)
                } else {
                    v.clone()
                }
            }
            serde_json::Value::Object(map) => {
                let normalized: serde_json::Map<String, serde_json::Value> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect();
                serde_json::Value::Object(normalized)
            }
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent, float-normalized comparison).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let text = load_fixture(name);
        let fixture: serde_json::Value = serde_json::from_str(&text)
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"));
        let parsed: T = serde_json::from_str(&text)
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized: serde_json::Value = serde_json::to_string(&parsed)
            .and_then(|s| serde_json::from_str(&s))
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "roundtrip mismatch for {name}:\n  Bridge: {fixture}\n  Rust:   {reserialized}"
        );
        parsed
    }

    // --- Envelope tests ---

    #[test]
    fn fixture_sub_envelope() {
        let env: Envelope = roundtrip_test("sub_envelope.json");
        assert_eq!(env.header.msg_type, MessageType::Sub);
        assert_eq!(env.header.content_type, ContentType::Json);
        assert_eq!(env.header.seq, env.header.timestamp);
        assert_eq!(env.payload_json(), "{}");
    }

    #[test]
    fn fixture_command_envelope() {
        let env: Envelope = roundtrip_test("command_envelope.json");
        assert_eq!(env.header.msg_type, MessageType::Command);
        assert_eq!(
            env.header.idempotency_key.as_deref(),
            Some("6f1c2a9e-58b4-4d8e-9a0f-2f4d6c1b7e33")
        );
    }

    #[test]
    fn fixture_publish_action_event() {
        let env: Envelope = roundtrip_test("publish_action_event.json");
        assert_eq!(env.header.msg_type, MessageType::Publish);
        assert_eq!(env.header.monotonic, Some(98213344));

        let event: ActionEvent = env.parse_payload().unwrap();
        assert_eq!(event.action_name, "pallet_lift");
        assert_eq!(event.severity, Severity::Warn);
        assert_eq!(event.payload_json.as_deref(), Some("{\"pallet_id\":\"P-17\"}"));
    }

    #[test]
    fn built_sub_envelope_matches_fixture_shape() {
        let built: serde_json::Value = serde_json::from_str(
            &serde_json::to_string(&Envelope::control(MessageType::Sub, "health.overall").unwrap())
                .unwrap(),
        )
        .unwrap();
        let fixture: serde_json::Value =
            serde_json::from_str(&load_fixture("sub_envelope.json")).unwrap();

        let keys = |v: &serde_json::Value| -> Vec<String> {
            let mut k: Vec<String> = v["header"].as_object().unwrap().keys().cloned().collect();
            k.sort();
            k
        };
        assert_eq!(keys(&built), keys(&fixture));
        assert_eq!(built["header"]["msg_type"], fixture["header"]["msg_type"]);
        assert_eq!(built["header"]["channel"], fixture["header"]["channel"]);
        assert_eq!(built["payload"], fixture["payload"]);
    }

    // --- Payload tests ---

    #[test]
    fn fixture_action_event() {
        let event: ActionEvent = roundtrip_test("action_event.json");
        assert_eq!(event.severity, Severity::Error);
        assert!(event.payload_json.is_none());
    }

    #[test]
    fn fixture_health_status() {
        let status: HealthStatus = roundtrip_test("health_status.json");
        assert_eq!(status.state, ModuleState::Active);
        assert_eq!(status.diagnostics.as_ref().map(|d| d.len()), Some(2));
    }

    #[test]
    fn fixture_health_status_minimal() {
        let status: HealthStatus = roundtrip_test("health_status_minimal.json");
        assert_eq!(status.state, ModuleState::Inactive);
        assert!(status.cpu_usage.is_none());
        assert!(status.uptime.is_none());
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        let text = load_fixture("sub_envelope.json").replace("\"SUB\"", "\"SUBSCRIBE\"");
        assert!(serde_json::from_str::<Envelope>(&text).is_err());
    }
}
