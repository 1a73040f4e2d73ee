#![forbid(unsafe_code)]
//! Astreinte-sync — provisionnement déclaratif d'astreintes vers Oncall.
//!
//! - Lecture d'un fichier YAML (équipes, utilisateurs, gardes).
//! - Une passe séquentielle d'appels HTTP à créations idempotentes
//!   ("déjà existant" = succès).
//! - Aucun état local : tout l'état durable vit côté serveur.

pub mod client;
pub mod io;
pub mod model;
pub mod provision;

pub use client::{ClientError, HttpClient, OncallApi, Session};
pub use io::load_config;
pub use model::{Config, Contacts, Duty, Event, Team, User};
pub use provision::{
    roster_name, DutyFailure, Provisioner, SyncError, SyncOptions, SyncReport,
};
