//! MQTT adapter error types.

use roomsense_domain::error::RoomSenseError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The rumqttc client returned an error.
    #[error("MQTT client error")]
    Client(#[from] rumqttc::ClientError),

    /// An incoming payload was not valid UTF-8.
    #[error("MQTT payload is not valid UTF-8")]
    PayloadEncoding(#[from] std::str::Utf8Error),

    /// Failed to encode attributes as JSON.
    #[error("failed to encode attributes payload")]
    Json(#[from] serde_json::Error),

    /// A domain-level error (validation, not-found, etc.).
    #[error("domain error")]
    Domain(#[source] RoomSenseError),
}

impl MqttError {
    /// Convert into a [`RoomSenseError::Adapter`] for propagation across port
    /// boundaries.
    pub fn into_domain(self) -> RoomSenseError {
        match self {
            Self::Domain(err) => err,
            other => RoomSenseError::Adapter(Box::new(other)),
        }
    }
}

impl From<MqttError> for RoomSenseError {
    fn from(err: MqttError) -> Self {
        err.into_domain()
    }
}

impl From<RoomSenseError> for MqttError {
    fn from(err: RoomSenseError) -> Self {
        Self::Domain(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomsense_domain::error::ValidationError;

    #[test]
    fn should_convert_payload_error_to_adapter_error() {
        let utf8_err = std::str::from_utf8(&[0xff, 0xfe]).unwrap_err();
        let err: RoomSenseError = MqttError::PayloadEncoding(utf8_err).into();
        assert!(matches!(err, RoomSenseError::Adapter(_)));
    }

    #[test]
    fn should_convert_domain_error_back_to_domain() {
        let mqtt_err = MqttError::Domain(ValidationError::EmptyName.into());
        let back: RoomSenseError = mqtt_err.into();
        assert!(matches!(back, RoomSenseError::Validation(_)));
    }

    #[test]
    fn should_display_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{{bad").unwrap_err();
        let err = MqttError::Json(json_err);
        assert_eq!(err.to_string(), "failed to encode attributes payload");
    }
}
