//! User-facing wording. Dispatch and relay logic only ever see [`NotifyAction`];
//! every sentence a person reads comes from here.

use serde::{Deserialize, Serialize};

use crate::domain::NotifyAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    En,
    Es,
}

impl Locale {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Some(Self::En),
            "es" | "spanish" | "español" => Some(Self::Es),
            _ => None,
        }
    }

    pub fn action_label(self, action: NotifyAction) -> &'static str {
        match (self, action) {
            (Self::En, NotifyAction::Created) => "created",
            (Self::En, NotifyAction::Approved) => "approved",
            (Self::En, NotifyAction::Rejected) => "requested changes on",
            (Self::Es, NotifyAction::Created) => "creado",
            (Self::Es, NotifyAction::Approved) => "aprobado",
            (Self::Es, NotifyAction::Rejected) => "rechazado",
        }
    }

    pub fn default_approval_feedback(self) -> &'static str {
        match self {
            Self::En => "Approved",
            Self::Es => "Aprobado",
        }
    }

    /// Stand-in for an empty submission description in the relay payload.
    pub fn action_description(self, action: NotifyAction) -> String {
        match self {
            Self::En => format!("Action: {}", action.as_str()),
            Self::Es => format!("Acción: {}", self.action_label(action)),
        }
    }

    pub fn attempt_line(
        self,
        action: NotifyAction,
        client_email: &str,
        admin_email: &str,
        title: &str,
    ) -> String {
        match (self, action) {
            (Self::En, NotifyAction::Created) => {
                format!("Mail to {client_email} with copy to {admin_email}: new delivery \"{title}\"")
            }
            (Self::Es, NotifyAction::Created) => {
                format!("Correo a {client_email} con copia a {admin_email}: nueva entrega \"{title}\"")
            }
            (Self::En, _) => format!(
                "Notice to {admin_email}: client {client_email} {} \"{title}\"",
                self.action_label(action)
            ),
            (Self::Es, _) => format!(
                "Aviso a {admin_email}: el cliente {client_email} ha {} \"{title}\"",
                self.action_label(action)
            ),
        }
    }

    pub fn delivered_line(self, title: &str) -> String {
        match self {
            Self::En => format!("Mail for \"{title}\" handed to relay"),
            Self::Es => format!("Correo de \"{title}\" entregado al relay"),
        }
    }

    pub fn failed_line(self, title: &str) -> String {
        match self {
            Self::En => format!("Mail relay failed for \"{title}\", notification dropped"),
            Self::Es => format!("Fallo del relay de correo para \"{title}\", aviso descartado"),
        }
    }

    pub fn mail_subject(self) -> &'static str {
        match self {
            Self::En => "New design update",
            Self::Es => "Nueva actualización de diseño",
        }
    }

    pub fn copy_subject(self) -> String {
        match self {
            Self::En => format!("Copy: {}", self.mail_subject()),
            Self::Es => format!("Copia: {}", self.mail_subject()),
        }
    }

    pub fn mail_body(self, project_title: &str, description: &str) -> String {
        match self {
            Self::En => format!(
                "Hello,\n\nThere is news on your project: {project_title}\n\n{description}"
            ),
            Self::Es => format!(
                "Hola,\n\nHay novedades en tu proyecto: {project_title}\n\n{description}"
            ),
        }
    }
}
