use serde::{Deserialize, Serialize};

/// Racine du fichier déclaratif.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub teams: Vec<Team>,
}

/// Équipe d'astreinte. La même structure sert de déclaration YAML et de
/// payload de création côté API (les utilisateurs ne partent jamais sur le
/// fil, ils sont provisionnés un par un).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scheduling_timezone: String,
    pub email: String,
    pub slack_channel: String,
    #[serde(default, skip_serializing)]
    pub users: Vec<User>,
}

/// Membre d'astreinte. `contacts` n'existe pas dans le YAML : il est dérivé
/// du téléphone et de l'email au moment du provisionnement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub full_name: String,
    #[serde(skip_serializing)]
    pub phone_number: String,
    #[serde(skip_serializing)]
    pub email: String,
    #[serde(default, skip_deserializing)]
    pub contacts: Contacts,
    #[serde(rename = "duty", default, skip_serializing)]
    pub duties: Vec<Duty>,
}

impl User {
    /// Copie de l'utilisateur avec ses contacts dérivés de ses propres
    /// champs téléphone/email.
    pub fn with_contacts(&self) -> User {
        User {
            contacts: Contacts {
                call: self.phone_number.clone(),
                email: self.email.clone(),
            },
            ..self.clone()
        }
    }
}

/// Canaux de contact poussés vers le serveur.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contacts {
    pub call: String,
    pub email: String,
}

/// Garde déclarée : un jour calendaire (`JJ/MM/AAAA`) et un rôle libre.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duty {
    pub date: String,
    pub role: String,
}

/// Représentation serveur d'une garde : fenêtre [start, end) en secondes
/// Unix. Unité de la vérification d'existence avant création.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub start: i64,
    pub end: i64,
    pub user: String,
    pub team: String,
    pub role: String,
}
