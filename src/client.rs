use crate::model::{Event, Team, User};
use reqwest::blocking::{Client, Response};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// En-tête anti-CSRF exigé sur chaque appel mutateur.
const CSRF_HEADER: &str = "x-csrf-token";
/// Cookie de session posé par le serveur au login.
const SESSION_COOKIE: &str = "oncall-auth";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Échec d'un appel à l'API Oncall.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Le serveur n'a pas accordé de session (statut, cookie ou jeton absent).
    #[error("authentication failed: {0}")]
    Auth(String),
    /// L'entité existe déjà côté serveur (statut 422).
    #[error("already exists")]
    AlreadyExists,
    /// Payload refusé par le serveur (statut 400).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Cible absente côté serveur (statut 404 sur mise à jour).
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Unexpected { status: u16, body: String },
}

/// Accréditations de session : immuables après login, passées explicitement
/// à chaque opération.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub csrf_token: String,
    /// Paire `oncall-auth=<valeur>` renvoyée telle quelle en en-tête Cookie.
    pub cookie: String,
}

/// Capacités consommées par la passe de provisionnement.
pub trait OncallApi {
    /// Ouvre une session et récupère le couple cookie + jeton anti-CSRF.
    fn login(&self, username: &str, password: &str) -> Result<Session, ClientError>;
    fn create_team(&self, session: &Session, team: &Team) -> Result<(), ClientError>;
    fn create_user(&self, session: &Session, user: &User) -> Result<(), ClientError>;
    /// Remplace l'utilisateur côté serveur (pousse les contacts dérivés).
    fn update_user(&self, session: &Session, user: &User) -> Result<(), ClientError>;
    fn create_roster(
        &self,
        session: &Session,
        team: &str,
        roster: &str,
    ) -> Result<(), ClientError>;
    fn add_team_member(
        &self,
        session: &Session,
        team: &str,
        user: &str,
    ) -> Result<(), ClientError>;
    fn add_roster_member(
        &self,
        session: &Session,
        team: &str,
        roster: &str,
        user: &str,
    ) -> Result<(), ClientError>;
    /// Vrai si le serveur connaît déjà un évènement pour ce quadruplet.
    fn event_exists(
        &self,
        session: &Session,
        team: &str,
        user: &str,
        role: &str,
        start: i64,
    ) -> Result<bool, ClientError>;
    fn create_event(&self, session: &Session, event: &Event) -> Result<(), ClientError>;
}

/// Client HTTP bloquant de l'API Oncall.
#[derive(Debug, Clone)]
pub struct HttpClient {
    base_url: String,
    http: Client,
}

impl HttpClient {
    pub fn new<S: Into<String>>(base_url: S) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Variante avec délai de garde par requête configurable.
    pub fn with_timeout<S: Into<String>>(
        base_url: S,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("astreinte-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST JSON authentifié dont le seul succès attendu est 201.
    fn post_created<B: Serialize + ?Sized>(
        &self,
        session: &Session,
        path: &str,
        body: &B,
    ) -> Result<(), ClientError> {
        debug!(%path, "POST");
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header(COOKIE, session.cookie.as_str())
            .header(CSRF_HEADER, session.csrf_token.as_str())
            .json(body)
            .send()?;
        match response.status() {
            StatusCode::CREATED => Ok(()),
            StatusCode::UNPROCESSABLE_ENTITY => Err(ClientError::AlreadyExists),
            StatusCode::BAD_REQUEST => Err(ClientError::InvalidRequest(read_body(response))),
            status => Err(ClientError::Unexpected {
                status: status.as_u16(),
                body: read_body(response),
            }),
        }
    }
}

#[derive(Deserialize)]
struct LoginBody {
    #[serde(default)]
    csrf_token: String,
}

impl OncallApi for HttpClient {
    fn login(&self, username: &str, password: &str) -> Result<Session, ClientError> {
        debug!(%username, "POST /login");
        let response = self
            .http
            .post(format!("{}/login", self.base_url))
            .form(&[("username", username), ("password", password)])
            .send()?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ClientError::Auth(format!("login returned status {status}")));
        }

        let prefix = format!("{SESSION_COOKIE}=");
        let cookie = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|raw| raw.split(';').next())
            .map(str::trim)
            .find(|pair| pair.starts_with(prefix.as_str()))
            .map(str::to_string)
            .ok_or_else(|| {
                ClientError::Auth(format!("login did not set the {SESSION_COOKIE} cookie"))
            })?;

        let body: LoginBody = response.json()?;
        if body.csrf_token.is_empty() {
            return Err(ClientError::Auth("login did not return a csrf token".into()));
        }

        Ok(Session {
            csrf_token: body.csrf_token,
            cookie,
        })
    }

    fn create_team(&self, session: &Session, team: &Team) -> Result<(), ClientError> {
        self.post_created(session, "/api/v0/teams", team)
    }

    fn create_user(&self, session: &Session, user: &User) -> Result<(), ClientError> {
        self.post_created(session, "/api/v0/users", user)
    }

    fn update_user(&self, session: &Session, user: &User) -> Result<(), ClientError> {
        debug!(user = %user.name, "PUT /api/v0/users");
        let response = self
            .http
            .put(format!("{}/api/v0/users/{}", self.base_url, user.name))
            .header(COOKIE, session.cookie.as_str())
            .header(CSRF_HEADER, session.csrf_token.as_str())
            .json(user)
            .send()?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(()),
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(user.name.clone())),
            status => Err(ClientError::Unexpected {
                status: status.as_u16(),
                body: read_body(response),
            }),
        }
    }

    fn create_roster(
        &self,
        session: &Session,
        team: &str,
        roster: &str,
    ) -> Result<(), ClientError> {
        self.post_created(
            session,
            &format!("/api/v0/teams/{team}/rosters"),
            &serde_json::json!({ "name": roster }),
        )
    }

    fn add_team_member(
        &self,
        session: &Session,
        team: &str,
        user: &str,
    ) -> Result<(), ClientError> {
        self.post_created(
            session,
            &format!("/api/v0/teams/{team}/users"),
            &serde_json::json!({ "team": team, "user": user }),
        )
    }

    fn add_roster_member(
        &self,
        session: &Session,
        team: &str,
        roster: &str,
        user: &str,
    ) -> Result<(), ClientError> {
        self.post_created(
            session,
            &format!("/api/v0/teams/{team}/rosters/{roster}/users"),
            &serde_json::json!({ "name": user }),
        )
    }

    fn event_exists(
        &self,
        session: &Session,
        team: &str,
        user: &str,
        role: &str,
        start: i64,
    ) -> Result<bool, ClientError> {
        debug!(%team, %user, %role, %start, "GET /api/v0/events");
        let start = start.to_string();
        let response = self
            .http
            .get(format!("{}/api/v0/events", self.base_url))
            .query(&[
                ("team", team),
                ("user", user),
                ("role", role),
                ("start", start.as_str()),
            ])
            .header(COOKIE, session.cookie.as_str())
            .header(CSRF_HEADER, session.csrf_token.as_str())
            .send()?;
        match response.status() {
            StatusCode::OK => {
                let events: Vec<serde_json::Value> = response.json()?;
                Ok(!events.is_empty())
            }
            status => Err(ClientError::Unexpected {
                status: status.as_u16(),
                body: read_body(response),
            }),
        }
    }

    fn create_event(&self, session: &Session, event: &Event) -> Result<(), ClientError> {
        self.post_created(session, "/api/v0/events", event)
    }
}

fn read_body(response: Response) -> String {
    response.text().unwrap_or_default()
}
