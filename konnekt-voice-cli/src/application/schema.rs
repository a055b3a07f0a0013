use konnekt_voice_signaling::SignalEnvelope;

/// JSON schema of the signaling wire format, pretty-printed
pub fn envelope_schema() -> serde_json::Result<String> {
    let schema = schemars::schema_for!(SignalEnvelope);
    serde_json::to_string_pretty(&schema)
}
