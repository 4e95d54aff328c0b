//! Rapport d'exécution
//!
//! Compteurs collectés pendant une commande `i`, affichés en fin de run et
//! éventuellement enregistrés en JSON.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

/// Statut global du run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Toutes les étapes demandées ont abouti
    Success,
    /// Terminé, mais avec des étapes sautées
    CompletedWithWarnings,
    /// Interrompu (échec d'une recherche d'adresse, d'une écriture...)
    Failed,
}

/// Étape sautée pour un waypoint
#[derive(Debug, Clone, Serialize)]
pub struct RunWarning {
    /// Nom du waypoint concerné
    pub waypoint: String,
    /// Message
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub duration_secs: f64,
    pub status: RunStatus,

    pub files_read: usize,
    pub waypoints_read: usize,
    pub waypoints_written: usize,
    pub timestamps_fixed: usize,
    pub timezones_applied: usize,
    pub addresses_resolved: usize,

    pub warnings: Vec<RunWarning>,
    /// Erreur ayant interrompu le run
    pub error: Option<String>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self {
            duration_secs: 0.0,
            status: RunStatus::Success,
            files_read: 0,
            waypoints_read: 0,
            waypoints_written: 0,
            timestamps_fixed: 0,
            timezones_applied: 0,
            addresses_resolved: 0,
            warnings: Vec::new(),
            error: None,
        }
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre un fichier lu et ses waypoints
    pub fn record_file(&mut self, waypoints: usize) {
        self.files_read += 1;
        self.waypoints_read += waypoints;
    }

    pub fn record_timestamp_fixed(&mut self) {
        self.timestamps_fixed += 1;
    }

    pub fn record_timezone_applied(&mut self) {
        self.timezones_applied += 1;
    }

    pub fn record_address(&mut self) {
        self.addresses_resolved += 1;
    }

    pub fn record_written(&mut self, waypoints: usize) {
        self.waypoints_written += waypoints;
    }

    pub fn record_warning(&mut self, waypoint: &str, message: impl Into<String>) {
        self.warnings.push(RunWarning {
            waypoint: waypoint.to_string(),
            message: message.into(),
        });
    }

    /// Enregistre l'erreur fatale du run
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        self.status = if self.error.is_some() {
            RunStatus::Failed
        } else if !self.warnings.is_empty() {
            RunStatus::CompletedWithWarnings
        } else {
            RunStatus::Success
        };
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("RUN REPORT");
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        println!(
            "Files: {} read, waypoints: {} read, {} written",
            self.files_read, self.waypoints_read, self.waypoints_written
        );
        println!(
            "Updates: {} timestamps fixed, {} timezones applied, {} addresses resolved",
            self.timestamps_fixed, self.timezones_applied, self.addresses_resolved
        );

        if !self.warnings.is_empty() {
            println!("\n--- WARNINGS ({}) ---", self.warnings.len());
            for w in self.warnings.iter().take(10) {
                println!("  [{}] {}", w.waypoint, w.message);
            }
            if self.warnings.len() > 10 {
                println!("  ... and {} more", self.warnings.len() - 10);
            }
        }

        if let Some(error) = &self.error {
            println!("\n--- ERROR ---");
            println!("  {}", error);
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{} waypoints from {} files: {} timestamps fixed, {} timezones, {} addresses, {} warnings",
            self.waypoints_read,
            self.files_read,
            self.timestamps_fixed,
            self.timezones_applied,
            self.addresses_resolved,
            self.warnings.len()
        )
    }
}
