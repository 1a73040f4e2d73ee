#![forbid(unsafe_code)]
use std::cell::RefCell;

use astreinte_sync::{
    roster_name, ClientError, Config, Event, OncallApi, Provisioner, Session, SyncError,
    SyncOptions, Team, User,
};

/// Double de test : journalise chaque appel et simule l'état distant.
#[derive(Default)]
struct FakeOncall {
    calls: RefCell<Vec<String>>,
    everything_exists: bool,
    existing_events: Vec<(String, String, String, i64)>,
    reject_event_lookup: bool,
    reject_team_create: bool,
}

impl FakeOncall {
    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl OncallApi for FakeOncall {
    fn login(&self, username: &str, _password: &str) -> Result<Session, ClientError> {
        self.record(format!("login {username}"));
        Ok(Session {
            csrf_token: "tok".into(),
            cookie: "oncall-auth=abc".into(),
        })
    }

    fn create_team(&self, _session: &Session, team: &Team) -> Result<(), ClientError> {
        self.record(format!("create_team {}", team.name));
        if self.reject_team_create {
            return Err(ClientError::Unexpected {
                status: 500,
                body: String::new(),
            });
        }
        if self.everything_exists {
            return Err(ClientError::AlreadyExists);
        }
        Ok(())
    }

    fn create_user(&self, _session: &Session, user: &User) -> Result<(), ClientError> {
        self.record(format!("create_user {}", user.name));
        if self.everything_exists {
            return Err(ClientError::AlreadyExists);
        }
        Ok(())
    }

    fn update_user(&self, _session: &Session, user: &User) -> Result<(), ClientError> {
        self.record(format!(
            "update_user {} call={} email={}",
            user.name, user.contacts.call, user.contacts.email
        ));
        Ok(())
    }

    fn create_roster(
        &self,
        _session: &Session,
        team: &str,
        roster: &str,
    ) -> Result<(), ClientError> {
        self.record(format!("create_roster {team} {roster}"));
        if self.everything_exists {
            return Err(ClientError::AlreadyExists);
        }
        Ok(())
    }

    fn add_team_member(
        &self,
        _session: &Session,
        team: &str,
        user: &str,
    ) -> Result<(), ClientError> {
        self.record(format!("add_team_member {team} {user}"));
        if self.everything_exists {
            return Err(ClientError::AlreadyExists);
        }
        Ok(())
    }

    fn add_roster_member(
        &self,
        _session: &Session,
        team: &str,
        roster: &str,
        user: &str,
    ) -> Result<(), ClientError> {
        self.record(format!("add_roster_member {team} {roster} {user}"));
        if self.everything_exists {
            return Err(ClientError::AlreadyExists);
        }
        Ok(())
    }

    fn event_exists(
        &self,
        _session: &Session,
        team: &str,
        user: &str,
        role: &str,
        start: i64,
    ) -> Result<bool, ClientError> {
        self.record(format!("event_exists {team} {user} {role} {start}"));
        if self.reject_event_lookup {
            return Err(ClientError::Unexpected {
                status: 500,
                body: String::new(),
            });
        }
        Ok(self
            .existing_events
            .iter()
            .any(|(t, u, r, s)| t == team && u == user && r == role && *s == start))
    }

    fn create_event(&self, _session: &Session, event: &Event) -> Result<(), ClientError> {
        self.record(format!(
            "create_event {} {} {} {} {}",
            event.team, event.user, event.role, event.start, event.end
        ));
        Ok(())
    }
}

fn sample_config() -> Config {
    serde_yaml::from_str(
        r##"
teams:
  - name: core
    scheduling_timezone: Europe/Paris
    email: core@example.com
    slack_channel: "#core-oncall"
    users:
      - name: alice
        full_name: Alice Martin
        phone_number: "+1555"
        email: a@x.com
        duty:
          - date: 01/01/2023
            role: secondary
"##,
    )
    .unwrap()
}

#[test]
fn provisions_single_team_in_declared_order() {
    let provisioner = Provisioner::new(FakeOncall::default());
    let report = provisioner.run(&sample_config(), "root", "root").unwrap();

    let calls = provisioner.api().calls();
    let calls: Vec<&str> = calls.iter().map(String::as_str).collect();
    assert_eq!(
        calls,
        vec![
            "login root",
            "create_team core",
            "create_roster core core-roster",
            "create_user alice",
            "update_user alice call=+1555 email=a@x.com",
            "add_team_member core alice",
            "add_roster_member core core-roster alice",
            "event_exists core alice secondary 1672531200",
            "create_event core alice secondary 1672531200 1672617600",
        ]
    );

    assert_eq!(report.teams_created, 1);
    assert_eq!(report.events_created, 1);
    assert!(report.is_clean());
}

#[test]
fn every_declared_user_gets_both_memberships() {
    let config: Config = serde_yaml::from_str(
        r##"
teams:
  - name: core
    email: core@example.com
    slack_channel: "#core-oncall"
    users:
      - name: alice
        full_name: Alice Martin
        phone_number: "+1555"
        email: a@x.com
      - name: bob
        full_name: Bob Morane
        phone_number: "+1556"
        email: b@x.com
  - name: infra
    email: infra@example.com
    slack_channel: "#infra-oncall"
    users:
      - name: carol
        full_name: Carol Danvers
        phone_number: "+1557"
        email: c@x.com
"##,
    )
    .unwrap();

    let provisioner = Provisioner::new(FakeOncall::default());
    let report = provisioner.run(&config, "root", "root").unwrap();

    assert_eq!(report.teams_created, 2);
    assert_eq!(report.rosters_created, 2);
    assert_eq!(report.users_created, 3);

    let calls = provisioner.api().calls();
    // une seule authentification pour toute la passe
    assert_eq!(calls.iter().filter(|c| c.starts_with("login")).count(), 1);
    for (team, roster, user) in [
        ("core", "core-roster", "alice"),
        ("core", "core-roster", "bob"),
        ("infra", "infra-roster", "carol"),
    ] {
        assert!(calls.contains(&format!("add_team_member {team} {user}")));
        assert!(calls.contains(&format!("add_roster_member {team} {roster} {user}")));
    }
    // les équipes sont traitées dans l'ordre du fichier
    let core_pos = calls.iter().position(|c| c == "create_team core").unwrap();
    let infra_pos = calls.iter().position(|c| c == "create_team infra").unwrap();
    assert!(core_pos < infra_pos);
}

#[test]
fn second_run_over_existing_state_succeeds_without_creates() {
    let api = FakeOncall {
        everything_exists: true,
        existing_events: vec![(
            "core".to_string(),
            "alice".to_string(),
            "secondary".to_string(),
            1672531200,
        )],
        ..FakeOncall::default()
    };
    let provisioner = Provisioner::new(api);
    let report = provisioner.run(&sample_config(), "root", "root").unwrap();

    assert_eq!(report.teams_created, 0);
    assert_eq!(report.teams_existing, 1);
    assert_eq!(report.users_existing, 1);
    assert_eq!(report.events_created, 0);
    assert_eq!(report.events_skipped, 1);

    let calls = provisioner.api().calls();
    assert!(!calls.iter().any(|c| c.starts_with("create_event")));
    // les contacts sont quand même poussés sur un utilisateur existant
    assert!(calls.iter().any(|c| c.starts_with("update_user alice")));
}

#[test]
fn existing_event_skips_the_create_call() {
    let api = FakeOncall {
        existing_events: vec![(
            "core".to_string(),
            "alice".to_string(),
            "secondary".to_string(),
            1672531200,
        )],
        ..FakeOncall::default()
    };
    let provisioner = Provisioner::new(api);
    let report = provisioner.run(&sample_config(), "root", "root").unwrap();

    assert_eq!(report.events_skipped, 1);
    assert_eq!(report.events_created, 0);
    let calls = provisioner.api().calls();
    assert!(!calls.iter().any(|c| c.starts_with("create_event")));
}

#[test]
fn malformed_duty_date_drops_remaining_duties_without_failing() {
    let config: Config = serde_yaml::from_str(
        r##"
teams:
  - name: core
    email: core@example.com
    slack_channel: "#core-oncall"
    users:
      - name: alice
        full_name: Alice Martin
        phone_number: "+1555"
        email: a@x.com
        duty:
          - date: 2023-01-01
            role: primary
          - date: 02/01/2023
            role: primary
"##,
    )
    .unwrap();

    let provisioner = Provisioner::new(FakeOncall::default());
    let report = provisioner.run(&config, "root", "root").unwrap();

    let calls = provisioner.api().calls();
    assert!(!calls.iter().any(|c| c.starts_with("event_exists")));
    assert!(!calls.iter().any(|c| c.starts_with("create_event")));
    assert_eq!(report.events_created, 0);
    assert_eq!(report.duty_failures.len(), 1);
    assert_eq!(report.duty_failures[0].date, "2023-01-01");
    assert!(!report.is_clean());
}

#[test]
fn event_lookup_failure_drops_user_duties_but_run_succeeds() {
    let api = FakeOncall {
        reject_event_lookup: true,
        ..FakeOncall::default()
    };
    let provisioner = Provisioner::new(api);
    let report = provisioner.run(&sample_config(), "root", "root").unwrap();

    assert_eq!(report.duty_failures.len(), 1);
    let calls = provisioner.api().calls();
    assert!(!calls.iter().any(|c| c.starts_with("create_event")));
}

#[test]
fn unexpected_team_error_aborts_the_run() {
    let api = FakeOncall {
        reject_team_create: true,
        ..FakeOncall::default()
    };
    let provisioner = Provisioner::new(api);
    let err = provisioner
        .run(&sample_config(), "root", "root")
        .unwrap_err();
    assert!(matches!(err, SyncError::Team { .. }));

    // rien d'autre n'est tenté après l'échec
    let calls = provisioner.api().calls();
    assert_eq!(calls, vec!["login root", "create_team core"]);
}

#[test]
fn duty_window_is_midnight_utc_plus_one_day() {
    let opts = SyncOptions::default();
    assert_eq!(opts.duty_window("15/03/2024").unwrap(), (1710460800, 1710547200));
    assert_eq!(opts.duty_window("01/01/2023").unwrap(), (1672531200, 1672617600));
    assert!(opts.duty_window("2024-03-15").is_err());
}

#[test]
fn roster_name_is_derived_from_team_name() {
    assert_eq!(roster_name("core"), "core-roster");
}
