//! HTTP implementation of the content storage API
//!
//! Talks JSON over REST:
//!
//! - `GET  /schools[?code=|?name=]`, `POST /schools`
//! - `GET  /schools/{id}/courses`, `POST /schools/{id}/courses`
//! - `GET  /courses/{id}`, `PUT /courses/{id}/versions`
//! - `POST /files` (multipart, field `file`)

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

use super::error::StoreError;
use super::models::{Course, DocumentRef, ListVersion, NewCourse, NewSchool, School};
use super::store::ContentStore;
use crate::config::ApiConfig;

/// Collections may come back bare or wrapped in `{"data": [...]}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse<T> {
    Wrapped { data: Vec<T> },
    Plain(Vec<T>),
}

impl<T> ListResponse<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListResponse::Wrapped { data } => data,
            ListResponse::Plain(items) => items,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: String,
}

/// Content store backed by the remote REST API
#[derive(Debug, Clone)]
pub struct HttpContentStore {
    client: Client,
    base_url: String,
    token: Option<String>,
    write_timeout: Duration,
    upload_timeout: Duration,
}

impl HttpContentStore {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            anyhow::bail!(
                "No API base URL configured. Set [api] base_url or SUPPLY_IMPORT_API_URL."
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
            write_timeout: Duration::from_secs(config.write_timeout_secs),
            upload_timeout: Duration::from_secs(config.upload_timeout_secs),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<Response, StoreError> {
        debug!("storage API: {}", operation);
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| transport_error(e, operation))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, body, operation))
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
        response.json::<T>().await.map_err(|e| StoreError::Decode {
            message: e.to_string(),
        })
    }

    async fn find_one_school(&self, query: &[(&str, String)]) -> Result<Option<School>, StoreError> {
        let request = self.client.get(self.url("schools")).query(query);
        let response = self.send(request, "find school").await?;
        let schools: ListResponse<School> = Self::read_json(response).await?;
        Ok(schools.into_vec().into_iter().next())
    }
}

/// Map a reqwest transport failure onto the store error taxonomy
pub(crate) fn transport_error(error: reqwest::Error, operation: &str) -> StoreError {
    if error.is_timeout() {
        StoreError::Timeout {
            operation: operation.to_string(),
        }
    } else if error.is_connect() {
        StoreError::Unreachable {
            message: error.to_string(),
        }
    } else {
        StoreError::Network {
            message: error.to_string(),
        }
    }
}

/// Map a non-success status onto the store error taxonomy
pub(crate) fn status_error(status: StatusCode, body: String, operation: &str) -> StoreError {
    let lowered = body.to_lowercase();
    let mentions_duplicate = lowered.contains("duplicate")
        || lowered.contains("already exists")
        || lowered.contains("unique");

    match status {
        StatusCode::NOT_FOUND => StoreError::not_found(operation.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized { message: body },
        StatusCode::CONFLICT => StoreError::DuplicateCode {
            code: extract_code(&body).unwrap_or_default(),
        },
        StatusCode::TOO_MANY_REQUESTS => StoreError::Server {
            status: status.as_u16(),
            message: body,
        },
        s if s.is_server_error() => StoreError::Server {
            status: s.as_u16(),
            message: body,
        },
        s if mentions_duplicate => {
            debug!("{} rejected as duplicate ({})", operation, s);
            StoreError::DuplicateCode {
                code: extract_code(&body).unwrap_or_default(),
            }
        }
        s => StoreError::Rejected {
            status: s.as_u16(),
            message: body,
        },
    }
}

/// Best-effort extraction of the RBD code mentioned in an error body
fn extract_code(body: &str) -> Option<u64> {
    body.split(|c: char| !c.is_ascii_digit())
        .find(|part| part.len() >= 3)
        .and_then(|part| part.parse().ok())
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn list_schools(&self) -> Result<Vec<School>, StoreError> {
        let request = self.client.get(self.url("schools"));
        let response = self.send(request, "list schools").await?;
        let schools: ListResponse<School> = Self::read_json(response).await?;
        Ok(schools.into_vec())
    }

    async fn find_school_by_code(&self, code: u64) -> Result<Option<School>, StoreError> {
        self.find_one_school(&[("code", code.to_string())]).await
    }

    async fn find_school_by_name(&self, name: &str) -> Result<Option<School>, StoreError> {
        self.find_one_school(&[("name", name.to_string())]).await
    }

    async fn create_school(&self, school: &NewSchool) -> Result<String, StoreError> {
        let request = self.client.post(self.url("schools")).json(school);
        let response = self.send(request, "create school").await.map_err(|e| match e {
            StoreError::DuplicateCode { .. } => StoreError::DuplicateCode { code: school.code },
            other => other,
        })?;
        let created: CreatedResponse = Self::read_json(response).await?;
        Ok(created.id)
    }

    async fn list_courses(&self, school_id: &str) -> Result<Vec<Course>, StoreError> {
        let path = format!("schools/{}/courses", urlencoding::encode(school_id));
        let request = self.client.get(self.url(&path));
        let response = self.send(request, "list courses").await?;
        let courses: ListResponse<Course> = Self::read_json(response).await?;
        Ok(courses.into_vec())
    }

    async fn create_course(
        &self,
        school_id: &str,
        course: &NewCourse,
    ) -> Result<String, StoreError> {
        let path = format!("schools/{}/courses", urlencoding::encode(school_id));
        let request = self.client.post(self.url(&path)).json(course);
        let response = self.send(request, "create course").await?;
        let created: CreatedResponse = Self::read_json(response).await?;
        Ok(created.id)
    }

    async fn get_course(&self, id: &str) -> Result<Option<Course>, StoreError> {
        let path = format!("courses/{}", urlencoding::encode(id));
        let request = self.client.get(self.url(&path));
        match self.send(request, "get course").await {
            Ok(response) => Ok(Some(Self::read_json(response).await?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn update_course_versions(
        &self,
        id: &str,
        versions: &[ListVersion],
    ) -> Result<(), StoreError> {
        let path = format!("courses/{}/versions", urlencoding::encode(id));
        let request = self
            .client
            .put(self.url(&path))
            .timeout(self.write_timeout)
            .json(&json!({ "versions": versions }));
        self.send(request, "update course versions").await?;
        Ok(())
    }

    async fn upload_file(&self, bytes: &[u8], name: &str) -> Result<DocumentRef, StoreError> {
        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name(name.to_string())
            .mime_str("application/pdf")
            .map_err(|e| StoreError::Rejected {
                status: 0,
                message: e.to_string(),
            })?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let request = self
            .client
            .post(self.url("files"))
            .timeout(self.upload_timeout)
            .multipart(form);
        let response = self.send(request, "upload file").await?;
        Self::read_json(response).await
    }
}
