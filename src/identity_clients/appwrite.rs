use crate::config::IdentityConfig;
use crate::error::AppError;
use crate::session::{Account, IdentityError, IdentityProvider, Session};
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

const PROJECT_HEADER: &str = "X-Appwrite-Project";

/// Appwrite account API over REST. The session cookie lives in the client's
/// cookie jar, so one instance represents one signed-in device. With a
/// `session_file` configured the jar is saved there and reloaded on startup.
pub struct AppwriteIdentity {
    client: Client,
    endpoint: Url,
    jar: Arc<Jar>,
    session_file: Option<PathBuf>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl AppwriteIdentity {
    pub fn new(config: &IdentityConfig) -> Result<Self, AppError> {
        log::debug!("Creating Appwrite client for endpoint: {}", config.endpoint);
        let mut endpoint = Url::parse(&config.endpoint)
            .map_err(|e| AppError::Generic(format!("invalid identity endpoint: {}", e)))?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            PROJECT_HEADER,
            HeaderValue::from_str(&config.project_id)
                .map_err(|e| AppError::Generic(format!("invalid project id: {}", e)))?,
        );
        if let Some(platform) = &config.platform {
            let origin = format!("appwrite-android://{}", platform);
            headers.insert(
                ORIGIN,
                HeaderValue::from_str(&origin)
                    .map_err(|e| AppError::Generic(format!("invalid platform: {}", e)))?,
            );
        }

        let jar = Arc::new(Jar::default());
        let session_file = config.session_file.as_ref().map(PathBuf::from);
        if let Some(path) = &session_file {
            load_cookies(&jar, path, &endpoint)?;
        }

        let client = Client::builder()
            .cookie_provider(jar.clone())
            .default_headers(headers)
            .build()?;
        log::trace!("Appwrite client created successfully.");
        Ok(Self {
            client,
            endpoint,
            jar,
            session_file,
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, IdentityError> {
        let url = self.endpoint.join(path).map_err(|e| IdentityError {
            code: None,
            message: e.to_string(),
        })?;
        log::trace!("Appwrite {} {}", method, url);
        Ok(self.client.request(method, url))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, IdentityError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status.to_string(),
        };
        Err(IdentityError {
            code: Some(status.as_u16()),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, IdentityError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(transport_error)
    }
}

/// The file holds a single `Cookie` header line as sent to the endpoint.
fn load_cookies(jar: &Jar, path: &Path, endpoint: &Url) -> Result<(), AppError> {
    let line = match std::fs::read_to_string(path) {
        Ok(line) => line,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("No saved session at {:?}", path);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let mut count = 0;
    for pair in line.trim().split("; ").filter(|pair| !pair.is_empty()) {
        jar.add_cookie_str(pair, endpoint);
        count += 1;
    }
    log::debug!("Loaded {} saved session cookies from {:?}", count, path);
    Ok(())
}

fn storage_error(e: std::io::Error) -> IdentityError {
    IdentityError {
        code: None,
        message: e.to_string(),
    }
}

fn transport_error(e: reqwest::Error) -> IdentityError {
    IdentityError {
        code: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
    }
}

#[async_trait]
impl IdentityProvider for AppwriteIdentity {
    async fn current_session(&self) -> Result<Option<Session>, IdentityError> {
        let request = self.request(Method::GET, "account/sessions/current")?;
        match self.send_json(request).await {
            Ok(session) => Ok(Some(session)),
            Err(e) if e.code == Some(StatusCode::UNAUTHORIZED.as_u16()) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn account(&self) -> Result<Account, IdentityError> {
        let request = self.request(Method::GET, "account")?;
        self.send_json(request).await
    }

    async fn create_account(
        &self,
        user_id: &str,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Account, IdentityError> {
        let request = self.request(Method::POST, "account")?.json(&json!({
            "userId": user_id,
            "email": email,
            "password": password,
            "name": name,
        }));
        self.send_json(request).await
    }

    async fn create_email_password_session(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError> {
        let request = self
            .request(Method::POST, "account/sessions/email")?
            .json(&json!({ "email": email, "password": password }));
        self.send_json(request).await
    }

    async fn delete_current_session(&self) -> Result<(), IdentityError> {
        let request = self.request(Method::DELETE, "account/sessions/current")?;
        self.send(request).await.map(|_| ())
    }

    async fn create_recovery(&self, email: &str, redirect_url: &str) -> Result<(), IdentityError> {
        let request = self
            .request(Method::POST, "account/recovery")?
            .json(&json!({ "email": email, "url": redirect_url }));
        self.send(request).await.map(|_| ())
    }

    async fn persist_session(&self) -> Result<(), IdentityError> {
        let Some(path) = &self.session_file else {
            return Ok(());
        };
        let Some(cookies) = self.jar.cookies(&self.endpoint) else {
            log::debug!("No session cookies to save");
            return self.forget_session().await;
        };
        let line = cookies.to_str().map_err(|e| IdentityError {
            code: None,
            message: e.to_string(),
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(storage_error)?;
        }
        tokio::fs::write(path, line).await.map_err(storage_error)?;
        log::debug!("Saved session to {:?}", path);
        Ok(())
    }

    async fn forget_session(&self) -> Result<(), IdentityError> {
        let Some(path) = &self.session_file else {
            return Ok(());
        };
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(e)),
        }
    }
}
