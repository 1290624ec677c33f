use crate::session::Session;
use crate::validation::escape_html;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rand::rngs::OsRng;
use rand::RngCore;

const TOKEN_KEY: &str = "csrf_token";
const TOKEN_BYTES: usize = 32;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Invalid CSRF token. Please refresh the page and try again.")]
pub struct CsrfError;

impl IntoResponse for CsrfError {
    fn into_response(self) -> Response {
        (StatusCode::FORBIDDEN, self.to_string()).into_response()
    }
}

/// One token per session, created on first use and kept until the session
/// ends.
pub struct CsrfGuard<'a> {
    session: &'a Session,
}

impl<'a> CsrfGuard<'a> {
    pub fn new(session: &'a Session) -> Self {
        CsrfGuard { session }
    }

    pub fn issue_token(&self) -> String {
        if let Some(token) = self.current_token() {
            return token;
        }
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        self.session.set(TOKEN_KEY, token.clone());
        token
    }

    pub fn current_token(&self) -> Option<String> {
        self.session.get_str(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    pub fn verify(&self, candidate: &str) -> bool {
        match self.current_token() {
            Some(token) if !candidate.is_empty() => {
                constant_time_eq(token.as_bytes(), candidate.as_bytes())
            }
            _ => false,
        }
    }

    pub fn require(&self, candidate: Option<&str>) -> Result<(), CsrfError> {
        if self.verify(candidate.unwrap_or("")) {
            Ok(())
        } else {
            tracing::warn!(session = %self.session.id(), "rejected request with bad csrf token");
            Err(CsrfError)
        }
    }

    pub fn hidden_field(&self) -> String {
        format!(
            r#"<input type="hidden" name="csrf_token" value="{}">"#,
            escape_html(&self.issue_token())
        )
    }
}

/// Runs in time independent of where the inputs first differ. A length
/// mismatch returns early; token length is not secret.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
