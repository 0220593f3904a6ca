use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use sitelog_core::auth::{CredentialStore, Session, SessionStore};
use sitelog_core::config::ENV_PASSWORD;
use sitelog_core::models::User;
use sitelog_core::{ApiClient, Config, QueryCache, SiteLog};

/// Everything a command needs: config, the HTTP client and the cached
/// service on top of it.
pub struct App {
    pub config: Config,
    pub json: bool,
    pub client: ApiClient,
    pub site: SiteLog,
}

impl App {
    pub fn new(config: Config, json: bool) -> Result<Self> {
        let cache_dir = config.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
        debug!(?cache_dir, "Cache directory configured");

        // Load session from disk if it exists
        let mut session = Session::new(cache_dir);
        match session.load() {
            Ok(loaded) => debug!(loaded, "Session loaded"),
            Err(e) => warn!(error = %e, "Ignoring unreadable session file"),
        }

        let client = ApiClient::with_timeout(
            &config.api_url,
            SessionStore::new(session),
            config.request_timeout(),
        )
        .with_context(|| format!("Failed to create client for {}", config.api_url))?;
        let site = SiteLog::from_client(client.clone(), QueryCache::new(config.stale_time()));

        Ok(Self {
            config,
            json,
            client,
            site,
        })
    }

    pub fn require_login(&self) -> Result<User> {
        match self.site.session().user() {
            Some(user) if !user.is_active() => {
                bail!("Account {} is inactive. Ask an admin to reactivate it.", user.username)
            }
            Some(user) => Ok(user),
            None => bail!("Not signed in. Run `sitelog login` first."),
        }
    }

    pub fn require_admin(&self) -> Result<User> {
        let user = self.require_login()?;
        if !user.is_admin() {
            bail!("This command needs an admin account ({} is a {}).", user.username, user.role);
        }
        Ok(user)
    }

    /// Interactive login. Offers the remembered user and password when the
    /// keychain has them; `SITELOG_PASSWORD` skips the prompt entirely.
    pub async fn login(&mut self, username: Option<String>, remember: bool) -> Result<User> {
        let username = match username.or_else(|| self.config.last_username.clone()) {
            Some(last_user) if CredentialStore::has_credentials(&last_user) => {
                let input = prompt(&format!("Username [{}]: ", last_user))?;
                if input.is_empty() {
                    last_user
                } else {
                    input
                }
            }
            Some(user) => user,
            None => prompt("Username: ")?,
        };
        if username.is_empty() {
            bail!("Username required");
        }

        let password = match std::env::var(ENV_PASSWORD).ok().filter(|p| !p.is_empty()) {
            Some(password) => password,
            None if CredentialStore::has_credentials(&username) => {
                let input = prompt("Use stored password? [Y/n]: ")?;
                if input.to_lowercase() != "n" {
                    CredentialStore::get_password(&username)?
                } else {
                    rpassword::prompt_password("Password: ")?
                }
            }
            None => rpassword::prompt_password("Password: ")?,
        };

        eprintln!("Authenticating...");
        let user = self
            .client
            .login(&username, &password)
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;

        if remember {
            if let Err(e) = CredentialStore::store(&username, &password) {
                warn!(error = %e, "Failed to store credentials");
            }
        }

        self.config.last_username = Some(username);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        info!(username = %user.username, "Signed in");
        Ok(user)
    }

    pub fn logout(&mut self) {
        if let Some(username) = self.config.last_username.as_deref() {
            if let Err(e) = CredentialStore::delete(username) {
                warn!(error = %e, "Failed to remove stored password");
            }
        }
        self.site.logout();
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
