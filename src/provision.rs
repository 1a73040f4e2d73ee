use crate::client::{ClientError, OncallApi, Session};
use crate::model::{Config, Event, Team, User};
use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Constantes de la passe : format de date du fichier déclaratif et durée
/// d'une garde.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Format chrono des dates de garde.
    pub date_format: &'static str,
    /// Durée d'une garde ; chaque évènement couvre exactement cette fenêtre.
    pub shift_duration: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            date_format: "%d/%m/%Y",
            shift_duration: Duration::days(1),
        }
    }
}

impl SyncOptions {
    /// Fenêtre [start, end) en secondes Unix d'une date de garde, à minuit
    /// UTC (fuseau de référence du serveur).
    pub fn duty_window(&self, date: &str) -> Result<(i64, i64), chrono::ParseError> {
        let day = NaiveDate::parse_from_str(date, self.date_format)?;
        let start = Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN)).timestamp();
        Ok((start, start + self.shift_duration.num_seconds()))
    }
}

/// Nom de roster dérivé, seul schéma de nommage supporté.
pub fn roster_name(team: &str) -> String {
    format!("{team}-roster")
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("authentication failed")]
    Auth(#[source] ClientError),
    #[error("provisioning team {team}")]
    Team {
        team: String,
        #[source]
        source: ClientError,
    },
    #[error("provisioning roster {roster}")]
    Roster {
        roster: String,
        #[source]
        source: ClientError,
    },
    #[error("provisioning user {user}")]
    User {
        user: String,
        #[source]
        source: ClientError,
    },
    #[error("adding {user} to {group}")]
    Membership {
        user: String,
        group: String,
        #[source]
        source: ClientError,
    },
    #[error("creating event for {user} ({role}, start {start})")]
    Event {
        user: String,
        role: String,
        start: i64,
        #[source]
        source: ClientError,
    },
}

/// Bilan d'une passe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub teams_created: u32,
    pub teams_existing: u32,
    pub rosters_created: u32,
    pub rosters_existing: u32,
    pub users_created: u32,
    pub users_existing: u32,
    pub events_created: u32,
    pub events_skipped: u32,
    pub duty_failures: Vec<DutyFailure>,
}

impl SyncReport {
    /// Vrai si aucune garde n'a été écartée en cours de passe.
    pub fn is_clean(&self) -> bool {
        self.duty_failures.is_empty()
    }
}

/// Garde écartée pendant la passe (la passe continue).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DutyFailure {
    pub user: String,
    pub date: String,
    pub reason: String,
}

/// Pilote la séquence de provisionnement contre une API Oncall : aligne
/// l'état distant sur l'état déclaré en tolérant ce qui existe déjà.
pub struct Provisioner<A: OncallApi> {
    api: A,
    opts: SyncOptions,
}

impl<A: OncallApi> Provisioner<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            opts: SyncOptions::default(),
        }
    }

    pub fn with_options(api: A, opts: SyncOptions) -> Self {
        Self { api, opts }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Une passe complète : authentification unique puis création idempotente
    /// de chaque équipe, roster, utilisateur, appartenance et garde, dans
    /// l'ordre du fichier déclaratif. Non transactionnel : en cas d'échec,
    /// les entités déjà créées restent en place.
    pub fn run(
        &self,
        config: &Config,
        username: &str,
        password: &str,
    ) -> Result<SyncReport, SyncError> {
        let session = self.api.login(username, password).map_err(SyncError::Auth)?;

        let mut report = SyncReport::default();
        for team in &config.teams {
            self.sync_team(&session, team, &mut report)?;
        }
        Ok(report)
    }

    fn sync_team(
        &self,
        session: &Session,
        team: &Team,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        match self.api.create_team(session, team) {
            Ok(()) => {
                info!(team = %team.name, "team created");
                report.teams_created += 1;
            }
            // conflit = équipe déjà provisionnée ; pas de mise à jour sur conflit
            Err(ClientError::AlreadyExists) => {
                debug!(team = %team.name, "team already exists");
                report.teams_existing += 1;
            }
            Err(source) => {
                return Err(SyncError::Team {
                    team: team.name.clone(),
                    source,
                })
            }
        }

        let roster = roster_name(&team.name);
        match self.api.create_roster(session, &team.name, &roster) {
            Ok(()) => {
                info!(%roster, "roster created");
                report.rosters_created += 1;
            }
            Err(ClientError::AlreadyExists) => {
                debug!(%roster, "roster already exists");
                report.rosters_existing += 1;
            }
            Err(source) => return Err(SyncError::Roster { roster, source }),
        }

        for user in &team.users {
            self.sync_user(session, &team.name, &roster, user, report)?;
        }
        Ok(())
    }

    fn sync_user(
        &self,
        session: &Session,
        team: &str,
        roster: &str,
        user: &User,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let user = user.with_contacts();

        match self.api.create_user(session, &user) {
            Ok(()) => {
                info!(user = %user.name, "user created");
                report.users_created += 1;
            }
            Err(ClientError::AlreadyExists) => {
                debug!(user = %user.name, "user already exists");
                report.users_existing += 1;
            }
            Err(source) => {
                return Err(SyncError::User {
                    user: user.name.clone(),
                    source,
                })
            }
        }

        // pousse les contacts dérivés même quand l'utilisateur existait déjà
        self.api
            .update_user(session, &user)
            .map_err(|source| SyncError::User {
                user: user.name.clone(),
                source,
            })?;

        match self.api.add_team_member(session, team, &user.name) {
            Ok(()) | Err(ClientError::AlreadyExists) => {}
            Err(source) => {
                return Err(SyncError::Membership {
                    user: user.name.clone(),
                    group: team.to_string(),
                    source,
                })
            }
        }

        match self.api.add_roster_member(session, team, roster, &user.name) {
            Ok(()) | Err(ClientError::AlreadyExists) => {}
            Err(source) => {
                return Err(SyncError::Membership {
                    user: user.name.clone(),
                    group: roster.to_string(),
                    source,
                })
            }
        }

        self.sync_duties(session, team, &user, report)
    }

    /// Provisionne les gardes d'un utilisateur.
    ///
    /// Une date illisible ou un échec de la requête d'existence écarte la
    /// garde courante et les suivantes de cet utilisateur sans faire échouer
    /// la passe ; l'incident est tracé et compté dans le bilan. Seul un
    /// échec de création d'évènement est fatal.
    fn sync_duties(
        &self,
        session: &Session,
        team: &str,
        user: &User,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        for duty in &user.duties {
            let (start, end) = match self.opts.duty_window(&duty.date) {
                Ok(window) => window,
                Err(err) => {
                    warn!(
                        user = %user.name,
                        date = %duty.date,
                        %err,
                        "unparseable duty date, dropping this user's remaining duties"
                    );
                    report.duty_failures.push(DutyFailure {
                        user: user.name.clone(),
                        date: duty.date.clone(),
                        reason: err.to_string(),
                    });
                    return Ok(());
                }
            };

            let exists =
                match self
                    .api
                    .event_exists(session, team, &user.name, &duty.role, start)
                {
                    Ok(exists) => exists,
                    Err(err) => {
                        warn!(
                            user = %user.name,
                            date = %duty.date,
                            %err,
                            "event lookup failed, dropping this user's remaining duties"
                        );
                        report.duty_failures.push(DutyFailure {
                            user: user.name.clone(),
                            date: duty.date.clone(),
                            reason: err.to_string(),
                        });
                        return Ok(());
                    }
                };

            if exists {
                debug!(user = %user.name, date = %duty.date, role = %duty.role, "event already scheduled");
                report.events_skipped += 1;
                continue;
            }

            let event = Event {
                start,
                end,
                user: user.name.clone(),
                team: team.to_string(),
                role: duty.role.clone(),
            };
            self.api
                .create_event(session, &event)
                .map_err(|source| SyncError::Event {
                    user: user.name.clone(),
                    role: duty.role.clone(),
                    start,
                    source,
                })?;
            report.events_created += 1;
        }
        Ok(())
    }
}
