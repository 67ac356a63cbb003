use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use jam_collab::{PlaybackUpdate, SettingsUpdate};
use jam_core::{CollectionKind, SearchKind};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VoteSchema {
    #[validate(length(min = 1, max = 128))]
    pub song_id: String,
}

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CollectionSchema {
    pub kind: CollectionKind,
    #[validate(length(min = 1, max = 128))]
    pub id: String,
}

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExportSchema {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SettingsSchema {
    #[validate(length(min = 1, max = 64))]
    pub name: Option<String>,
    pub active: Option<bool>,
    #[validate(length(min = 1, max = 128))]
    pub device: Option<String>,
}

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlaybackSchema {
    pub playing: Option<bool>,
    #[validate(length(min = 1, max = 128))]
    pub device: Option<String>,
    #[validate(range(max = 100))]
    pub volume: Option<u8>,
    pub seek_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub kind: SearchKind,
}

#[derive(Debug, Serialize)]
pub struct VoteResult {
    pub voted: bool,
}

#[derive(Debug, Serialize)]
pub struct CollectionResult {
    pub added: usize,
}

impl From<SettingsSchema> for SettingsUpdate {
    fn from(value: SettingsSchema) -> Self {
        Self {
            name: value.name,
            active: value.active,
            device: value.device,
        }
    }
}

impl From<PlaybackSchema> for PlaybackUpdate {
    fn from(value: PlaybackSchema) -> Self {
        Self {
            playing: value.playing,
            device: value.device,
            volume: value.volume,
            seek_ms: value.seek_ms,
        }
    }
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}
