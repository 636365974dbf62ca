use serde::Deserialize;

/// Profile update body. Only these fields are mutable through the profile
/// path; anything else a client sends is dropped during deserialization.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
}
