//! Access layer for the charter-rate backend.
//!
//! Every call goes through [`ApiClient`]. Authenticated calls carry the
//! stored access token; a 401 triggers one refresh (shared with any other
//! call that hit 401 at the same time) followed by exactly one retry.

use std::sync::Arc;

use chrono::NaiveDate;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::config::Config;
use crate::logging::{self, obj, v_str, Domain, TimedScope};
use crate::models::{AggregateFilter, AggregateRow, CreatedRecord, NewVesselRate, VesselFilter, VesselRate};
use crate::session::Session;
use crate::store::CredentialStore;

pub mod claims;
pub mod error;
mod refresh;
pub mod transport;

pub use error::{ApiError, FieldError};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport, TransportError};

use refresh::{RefreshFailure, RefreshGate, RefreshOutcome};

pub const LOGIN_PATH: &str = "/api/login/";
pub const REFRESH_PATH: &str = "/api/token/refresh/";
pub const VESSELS_PATH: &str = "/api/vessels/";
pub const AGGREGATE_PATH: &str = "/api/vessels/aggregate/";

/// Handle to the backend plus the credential store it authenticates from.
/// Cloning is cheap and clones share the session and any in-flight refresh.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    refresh: RefreshGate,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<CredentialStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                store,
                refresh: RefreshGate::default(),
            }),
        }
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(cfg.api_base.clone(), cfg.request_timeout)?;
        let store = CredentialStore::open(&cfg.sqlite_path)?;
        Ok(Self::new(Arc::new(transport), Arc::new(store)))
    }

    pub fn store(&self) -> &CredentialStore {
        &self.inner.store
    }

    pub fn session(&self) -> Session {
        self.inner.store.load()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_authenticated()
    }

    /// Exchange credentials for tokens, resolve the role and persist the
    /// resulting session.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, ApiError> {
        let req = ApiRequest::post(LOGIN_PATH, json!({ "username": username, "password": password }));
        let resp = self.inner.send(req, 1).await?;
        if !resp.is_success() {
            logging::warn(
                Domain::Auth,
                "login_rejected",
                obj(&[("username", v_str(username)), ("status", json!(resp.status))]),
            );
            return Err(ApiError::Auth("invalid credentials".to_string()));
        }

        let body: Map<String, Value> = decode(&resp)?;
        let token = |key: &str| {
            body.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ApiError::Decode(format!("login response missing `{}`", key)))
        };
        let access = token("access")?;
        let refresh = token("refresh")?;
        let (role, source) = claims::resolve_role(username, &body, &access);
        if source == claims::RoleSource::UsernameFallback {
            logging::warn(
                Domain::Auth,
                "role_from_username",
                obj(&[("username", v_str(username)), ("msg", v_str("backend issued no role claim"))]),
            );
        }

        let session = Session::authenticated(access, refresh, role);
        self.inner.store.save(&session)?;
        logging::info(
            Domain::Auth,
            "login",
            obj(&[
                ("username", v_str(username)),
                ("role", v_str(role.as_str())),
                ("role_source", v_str(source.as_str())),
            ]),
        );
        Ok(session)
    }

    pub async fn fetch_vessel_data(&self, filter: &VesselFilter) -> Result<Vec<VesselRate>, ApiError> {
        let req = ApiRequest::get(VESSELS_PATH).with_query(filter.to_query());
        let resp = self.inner.send_authorized(req).await?;
        if !resp.is_success() {
            return Err(ApiError::request(resp.status, &resp.body, "Failed to fetch vessel data"));
        }
        let rows: Vec<VesselRate> = decode(&resp)?;
        logging::debug(Domain::Api, "vessel_rows", obj(&[("count", json!(rows.len()))]));
        Ok(rows)
    }

    pub async fn fetch_aggregate(&self, filter: &AggregateFilter) -> Result<Vec<AggregateRow>, ApiError> {
        let req = ApiRequest::get(AGGREGATE_PATH).with_query(filter.to_query());
        let resp = self.inner.send_authorized(req).await?;
        if !resp.is_success() {
            return Err(ApiError::request(resp.status, &resp.body, "Failed to fetch aggregate data"));
        }
        decode(&resp)
    }

    pub async fn add_vessel_data(
        &self,
        vessel_name: &str,
        date: NaiveDate,
        hire_rate: f64,
        market_rate: f64,
    ) -> Result<VesselRate, ApiError> {
        self.submit(&NewVesselRate {
            vessel_name: vessel_name.to_string(),
            date,
            hire_rate,
            market_rate,
        })
        .await
    }

    /// Create a record. Rates are sent as given; range checks are the
    /// backend's call and come back as [`ApiError::Validation`].
    pub async fn submit(&self, entry: &NewVesselRate) -> Result<VesselRate, ApiError> {
        let body = serde_json::to_value(entry).map_err(|e| ApiError::Decode(e.to_string()))?;
        let resp = self.inner.send_authorized(ApiRequest::post(VESSELS_PATH, body)).await?;
        match resp.status {
            s if (200..300).contains(&s) => {
                let created: CreatedRecord = decode(&resp)?;
                let rate = created.into_rate();
                logging::info(
                    Domain::Api,
                    "vessel_added",
                    obj(&[("vessel", v_str(&rate.vessel_name)), ("date", v_str(&rate.date.to_string()))]),
                );
                Ok(rate)
            }
            400 | 422 => Err(ApiError::validation(&resp.body, "Failed to add vessel data")),
            status => Err(ApiError::request(status, &resp.body, "Failed to add vessel data")),
        }
    }

    /// Trade the stored refresh token for a new access token. Any failure
    /// wipes the session and yields [`ApiError::SessionExpired`].
    pub async fn refresh_access_token(&self) -> Result<(), ApiError> {
        self.inner.refresh_shared().await.map(|_| ())
    }

    /// Forget the session locally. The backend is not told.
    pub fn logout(&self) -> Result<(), ApiError> {
        self.inner.store.clear()?;
        logging::info(Domain::Auth, "logout", obj(&[]));
        Ok(())
    }
}

impl Inner {
    async fn send(&self, req: ApiRequest, attempt: u32) -> Result<ApiResponse, ApiError> {
        let method = req.method.as_str();
        let path = req.path.clone();
        let timer = TimedScope::new(Domain::Api, "request");
        match self.transport.send(req).await {
            Ok(resp) => {
                logging::log_request(method, &path, resp.status, attempt, timer.elapsed_ms());
                Ok(resp)
            }
            Err(err) => {
                logging::warn(
                    Domain::Api,
                    "transport_failed",
                    obj(&[
                        ("method", v_str(method)),
                        ("path", v_str(&path)),
                        ("transient", json!(err.is_transient())),
                        ("error", v_str(&err.message)),
                    ]),
                );
                Err(ApiError::Network(err))
            }
        }
    }

    /// Send with the stored access token; on 401 refresh once and retry once.
    async fn send_authorized(self: &Arc<Self>, req: ApiRequest) -> Result<ApiResponse, ApiError> {
        let sent_with = self.store.load().access_token;
        let first = self.send(req.clone().with_bearer(sent_with.clone()), 1).await?;
        if !first.is_unauthorized() {
            return Ok(first);
        }

        logging::info(
            Domain::Auth,
            "access_rejected",
            obj(&[
                ("path", v_str(&req.path)),
                ("token_fp", logging::v_opt(sent_with.as_deref().map(logging::token_fingerprint).as_deref())),
            ]),
        );

        // Someone else may have refreshed while this request was in flight.
        let current = self.store.load().access_token;
        let token = match current {
            Some(fresh) if sent_with.as_deref() != Some(fresh.as_str()) => fresh,
            _ => self.refresh_shared().await?,
        };

        let retry = self.send(req.with_bearer(Some(token)), 2).await?;
        if retry.is_unauthorized() {
            return Err(ApiError::unauthorized(&retry.body));
        }
        Ok(retry)
    }

    async fn refresh_shared(self: &Arc<Self>) -> Result<String, ApiError> {
        let this = Arc::clone(self);
        let (fut, started) = self.refresh.join_or_start(move || this.refresh_once().boxed());
        if !started {
            logging::debug(Domain::Auth, "refresh_joined", obj(&[]));
        }
        fut.await.map_err(|_| ApiError::SessionExpired)
    }

    async fn refresh_once(self: Arc<Self>) -> RefreshOutcome {
        let outcome = self.try_refresh().await;
        match &outcome {
            Ok(token) => logging::info(
                Domain::Auth,
                "refreshed",
                obj(&[("token_fp", v_str(&logging::token_fingerprint(token)))]),
            ),
            Err(failure) => self.expire(failure),
        }
        outcome
    }

    async fn try_refresh(&self) -> RefreshOutcome {
        #[derive(Deserialize)]
        struct RefreshBody {
            access: String,
        }

        let refresh = self.store.load().refresh_token.ok_or(RefreshFailure::MissingToken)?;
        let req = ApiRequest::post(REFRESH_PATH, json!({ "refresh": refresh }));
        let resp = match self.send(req, 1).await {
            Ok(resp) => resp,
            Err(ApiError::Network(err)) => return Err(RefreshFailure::Transport(err.message)),
            Err(other) => return Err(RefreshFailure::Transport(other.to_string())),
        };
        if !resp.is_success() {
            return Err(RefreshFailure::Rejected(resp.status));
        }
        let body: RefreshBody =
            serde_json::from_str(&resp.body).map_err(|e| RefreshFailure::BadBody(e.to_string()))?;
        let stored = self
            .store
            .set_access_token(&body.access, &refresh)
            .map_err(|e| RefreshFailure::Persist(e.to_string()))?;
        if !stored {
            return Err(RefreshFailure::Superseded);
        }
        Ok(body.access)
    }

    fn expire(&self, failure: &RefreshFailure) {
        // A logout already cleared the store, or a new login owns it now.
        if *failure == RefreshFailure::Superseded {
            logging::info(Domain::Auth, "refresh_discarded", obj(&[("reason", v_str(&failure.reason()))]));
            return;
        }
        if let Err(err) = self.store.clear() {
            logging::error(Domain::Store, "clear_failed", obj(&[("error", v_str(&err.to_string()))]));
        }
        logging::warn(Domain::Auth, "session_expired", obj(&[("reason", v_str(&failure.reason()))]));
    }
}

fn decode<T: DeserializeOwned>(resp: &ApiResponse) -> Result<T, ApiError> {
    serde_json::from_str(&resp.body).map_err(|e| ApiError::Decode(e.to_string()))
}
