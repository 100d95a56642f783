// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Session login for lab targets: fetch the login form, post credentials
//! with its CSRF token and keep the session cookie from the redirect.

use anyhow::{bail, Context, Result};
use tracing::{debug, info};
use url::Url;

use crate::config::HttpSettings;
use crate::http_client::{FormFields, HttpClient};

const SESSION_COOKIE: &str = "session";

/// Login credentials for automatic authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

impl Default for LoginCredentials {
    fn default() -> Self {
        Self::new("wiener", "peter")
    }
}

pub struct LabAuthenticator {
    settings: HttpSettings,
}

impl LabAuthenticator {
    pub fn new(settings: &HttpSettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    /// Log in at `{base_url}/login` and return the session cookie value.
    pub async fn login(&self, base_url: &str, credentials: &LoginCredentials) -> Result<String> {
        let login_url = Url::parse(base_url)
            .and_then(|base| base.join("/login"))
            .with_context(|| format!("Invalid base URL: {}", base_url))?
            .to_string();
        info!("[Auth] Logging in as {} at {}", credentials.username, login_url);

        let client = HttpClient::with_config(&login_url, &self.settings, None)
            .context("Failed to build login client")?;

        let page = client
            .get(&login_url)
            .await
            .context("Failed to fetch login page")?;
        let form = FormFields::parse(&page.body);
        let Some(csrf) = form.csrf else {
            bail!("No CSRF token on login page {}", login_url);
        };
        // The token is bound to the pre-login session cookie
        let pre_session = page
            .header("set-cookie")
            .and_then(|cookies| session_cookie(&cookies));

        let post_client = match pre_session.as_deref() {
            Some(session) => HttpClient::with_config(&login_url, &self.settings, Some(session))
                .context("Failed to build login client")?,
            None => client,
        };

        let response = post_client
            .post_form(
                &login_url,
                &[
                    ("csrf", csrf.as_str()),
                    ("username", credentials.username.as_str()),
                    ("password", credentials.password.as_str()),
                ],
            )
            .await
            .context("Login request failed")?;
        debug!("[Auth] Login answered HTTP {}", response.status_code);

        if response.status_code != 302 {
            bail!("Login rejected: expected HTTP 302, got {}", response.status_code);
        }

        let session = response
            .header("set-cookie")
            .and_then(|cookies| session_cookie(&cookies))
            .context("Login response carried no session cookie")?;
        info!("[Auth] Login succeeded");
        Ok(session)
    }
}

/// Value of the `session` cookie in newline-separated `Set-Cookie` values.
fn session_cookie(set_cookie: &str) -> Option<String> {
    set_cookie.lines().find_map(|line| {
        let pair = line.split(';').next()?.trim();
        let (name, value) = pair.split_once('=')?;
        (name.trim() == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie() {
        let cookies = "tracking=abc; Path=/\nsession=XyZ123; Secure; HttpOnly; SameSite=None";
        assert_eq!(session_cookie(cookies).as_deref(), Some("XyZ123"));
        assert_eq!(session_cookie("tracking=abc"), None);
        assert_eq!(session_cookie("session=; Path=/"), None);
    }

    #[test]
    fn test_default_credentials() {
        let creds = LoginCredentials::default();
        assert_eq!(creds.username, "wiener");
        assert_eq!(creds.password, "peter");
    }
}
