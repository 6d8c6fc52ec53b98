use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::archive::HeadObject;
use crate::auth::TokenProvider;
use crate::domain::{LimsRecord, ObjectId, RemoteObjectRef, RestoreTier, SourceKind};
use crate::error::PortalError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// Browser renders the content.
    #[default]
    Inline,
    /// Browser downloads the content.
    Attachment,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresignOptions {
    pub disposition: Disposition,
    pub content_type: Option<String>,
}

impl PresignOptions {
    pub fn attachment() -> Self {
        Self {
            disposition: Disposition::Attachment,
            content_type: None,
        }
    }

    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let disposition = match self.disposition {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        };
        let mut params = vec![("response-content-disposition", disposition.to_string())];
        if let Some(content_type) = &self.content_type {
            params.push(("response-content-type", content_type.clone()));
        }
        params
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StatusResponse {
    #[serde(default, alias = "volume_name", alias = "volume")]
    pub bucket: Option<String>,
    #[serde(default, alias = "path")]
    pub key: Option<String>,
    #[serde(default)]
    pub head_object: HeadObject,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PresignResponse {
    #[serde(default)]
    pub signed_url: Option<String>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RestoreRequest {
    pub days: u32,
    pub tier: RestoreTier,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RestoreResponse {
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SubjectRecord {
    pub id: String,
    #[serde(default)]
    pub lims: Vec<LimsRecord>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchPage {
    #[serde(default)]
    results: Vec<SearchRow>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchRow {
    id: Value,
    #[serde(default, alias = "volume_name")]
    bucket: Option<String>,
    #[serde(default, alias = "path")]
    key: Option<String>,
}

/// Renders an embedded `error` field into reason text.
pub fn error_text(error: &Value) -> String {
    match error {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// REST surface of the data portal this core consumes.
#[async_trait]
pub trait PortalClient: Send + Sync {
    async fn object_status(&self, object: &RemoteObjectRef) -> Result<StatusResponse, PortalError>;

    async fn presign(
        &self,
        object: &RemoteObjectRef,
        options: &PresignOptions,
    ) -> Result<PresignResponse, PortalError>;

    async fn restore(
        &self,
        object: &RemoteObjectRef,
        request: &RestoreRequest,
    ) -> Result<RestoreResponse, PortalError>;

    async fn subject(&self, subject_id: &str) -> Result<SubjectRecord, PortalError>;

    /// Looks up the object stored at exactly `path` in `container`.
    async fn find_object(
        &self,
        source: SourceKind,
        container: &str,
        path: &str,
    ) -> Result<Option<RemoteObjectRef>, PortalError>;
}

#[async_trait]
impl<P: PortalClient + ?Sized> PortalClient for std::sync::Arc<P> {
    async fn object_status(&self, object: &RemoteObjectRef) -> Result<StatusResponse, PortalError> {
        (**self).object_status(object).await
    }

    async fn presign(
        &self,
        object: &RemoteObjectRef,
        options: &PresignOptions,
    ) -> Result<PresignResponse, PortalError> {
        (**self).presign(object, options).await
    }

    async fn restore(
        &self,
        object: &RemoteObjectRef,
        request: &RestoreRequest,
    ) -> Result<RestoreResponse, PortalError> {
        (**self).restore(object, request).await
    }

    async fn subject(&self, subject_id: &str) -> Result<SubjectRecord, PortalError> {
        (**self).subject(subject_id).await
    }

    async fn find_object(
        &self,
        source: SourceKind,
        container: &str,
        path: &str,
    ) -> Result<Option<RemoteObjectRef>, PortalError> {
        (**self).find_object(source, container, path).await
    }
}

#[derive(Clone)]
pub struct PortalHttpClient<T: TokenProvider> {
    client: Client,
    base_url: String,
    tokens: T,
}

impl<T: TokenProvider> PortalHttpClient<T> {
    pub fn new(base_url: impl Into<String>, tokens: T) -> Result<Self, PortalError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("portal-tracks/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PortalError::PortalHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| PortalError::PortalHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        })
    }

    fn object_url(&self, object: &RemoteObjectRef, action: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url,
            object.source().api_segment(),
            object.object_id(),
            action
        )
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, PortalError> {
        let token = self.tokens.token().await?;
        Ok(request.bearer_auth(token))
    }

    async fn send_json<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R, PortalError> {
        let response = self
            .authorized(request)
            .await?
            .send()
            .await
            .map_err(|err| PortalError::PortalHttp(err.to_string()))?;
        let response = Self::handle_status(response).await?;
        response
            .json()
            .await
            .map_err(|err| PortalError::PortalHttp(err.to_string()))
    }

    async fn handle_status(response: Response) -> Result<Response, PortalError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "portal request failed".to_string());
        Err(PortalError::PortalStatus { status, message })
    }
}

#[async_trait]
impl<T: TokenProvider> PortalClient for PortalHttpClient<T> {
    async fn object_status(&self, object: &RemoteObjectRef) -> Result<StatusResponse, PortalError> {
        let url = self.object_url(object, "status");
        debug!(%url, "querying object status");
        self.send_json(self.client.get(&url)).await
    }

    async fn presign(
        &self,
        object: &RemoteObjectRef,
        options: &PresignOptions,
    ) -> Result<PresignResponse, PortalError> {
        let url = self.object_url(object, "presign");
        debug!(%url, "requesting presigned url");
        self.send_json(self.client.get(&url).query(&options.query_params()))
            .await
    }

    async fn restore(
        &self,
        object: &RemoteObjectRef,
        request: &RestoreRequest,
    ) -> Result<RestoreResponse, PortalError> {
        let url = self.object_url(object, "restore");
        debug!(%url, days = request.days, tier = %request.tier, "requesting restore");
        self.send_json(self.client.post(&url).json(request)).await
    }

    async fn subject(&self, subject_id: &str) -> Result<SubjectRecord, PortalError> {
        let url = format!("{}/subjects/{}", self.base_url, subject_id);
        self.send_json(self.client.get(&url)).await
    }

    async fn find_object(
        &self,
        source: SourceKind,
        container: &str,
        path: &str,
    ) -> Result<Option<RemoteObjectRef>, PortalError> {
        let url = format!("{}/{}", self.base_url, source.api_segment());
        let page: SearchPage = self
            .send_json(self.client.get(&url).query(&[("search", path)]))
            .await?;
        Ok(page.results.into_iter().find_map(|row| {
            let bucket = row.bucket?;
            let key = row.key?;
            if bucket != container || key.trim_start_matches('/') != path.trim_start_matches('/')
            {
                return None;
            }
            let id = match row.id {
                Value::String(id) => id,
                other => other.to_string(),
            };
            Some(RemoteObjectRef::new(source, bucket, key, ObjectId::new(id)))
        }))
    }
}
