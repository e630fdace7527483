pub use crate::protocol::Attestation;

#[derive(Deserialize)]
pub struct SignRequest {
    pub hash: Option<String>, // 64 hex chars
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub message: Option<String>,   // exact_message from a signing response
    pub signature: Option<String>, // base64
}

#[derive(Serialize, Debug)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerifyResponse {
    pub fn valid() -> Self {
        VerifyResponse {
            valid: true,
            error: None,
        }
    }

    pub fn invalid<S: Into<String>>(error: S) -> Self {
        VerifyResponse {
            valid: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Serialize)]
pub struct KeyResponse {
    pub public_key: String, // PEM
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}
