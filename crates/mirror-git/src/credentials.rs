//! Remote addressing and authentication

use std::cell::Cell;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use git2::{Cred, CredentialType, RemoteCallbacks};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const DEFAULT_HOST: &str = "github.com";

/// Authentication attempts before giving up on a remote.
const MAX_AUTH_ATTEMPTS: usize = 3;

/// How to reach the remote repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// `git@host:user/repo.git`, keys from the SSH agent
    Ssh,
    /// `https://host/user/repo.git`, personal access token
    Https,
}

impl FromStr for AuthMethod {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ssh" => Ok(AuthMethod::Ssh),
            "https" => Ok(AuthMethod::Https),
            _ => Err(Error::InvalidCredentials {
                method: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Ssh => write!(f, "ssh"),
            AuthMethod::Https => write!(f, "https"),
        }
    }
}

/// The `credentials` section of the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// `ssh` or `https`
    pub method: String,
    pub username: String,
    /// Repository name on the host
    pub repo: String,
    /// Required for `https`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
    /// Git host, `github.com` when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Explicit remote URL, replacing the one derived from host/username/repo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Credentials {
    /// Parse and check the credential method and its required fields.
    pub fn validate(&self) -> Result<AuthMethod> {
        let method: AuthMethod = self.method.parse()?;

        for (field, value) in [("username", &self.username), ("repo", &self.repo)] {
            if value.trim().is_empty() {
                return Err(Error::MissingCredential {
                    field: field.to_string(),
                    method: method.to_string(),
                });
            }
        }

        if method == AuthMethod::Https
            && self.github_token.as_deref().is_none_or(|t| t.trim().is_empty())
        {
            return Err(Error::MissingCredential {
                field: "github_token".into(),
                method: method.to_string(),
            });
        }

        Ok(method)
    }

    fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Auth {
    /// Local paths and `file://` remotes
    None,
    SshAgent { username: String },
    Token { username: String, token: String },
}

/// A remote URL plus whatever is needed to authenticate against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    url: String,
    auth: Auth,
}

impl Remote {
    /// Build the remote described by the configuration.
    ///
    /// The token is never embedded in the URL; it is handed to libgit2
    /// through the credential callback only.
    pub fn from_credentials(credentials: &Credentials) -> Result<Self> {
        let method = credentials.validate()?;
        let host = credentials.host();
        let username = credentials.username.clone();

        let (derived, auth) = match method {
            AuthMethod::Ssh => (
                format!("git@{host}:{}/{}.git", credentials.username, credentials.repo),
                Auth::SshAgent { username },
            ),
            AuthMethod::Https => (
                format!(
                    "https://{host}/{}/{}.git",
                    credentials.username, credentials.repo
                ),
                Auth::Token {
                    username,
                    token: credentials.github_token.clone().unwrap_or_default(),
                },
            ),
        };

        Ok(Self {
            url: credentials.url.clone().unwrap_or(derived),
            auth,
        })
    }

    /// A remote on the local filesystem, no authentication.
    pub fn local(path: impl AsRef<Path>) -> Self {
        Self {
            url: path.as_ref().to_string_lossy().into_owned(),
            auth: Auth::None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Callbacks answering libgit2 credential requests and turning rejected
    /// ref updates into errors.
    pub(crate) fn callbacks(&self) -> RemoteCallbacks<'_> {
        let mut callbacks = RemoteCallbacks::new();
        let attempts = Cell::new(0usize);

        callbacks.credentials(move |_url, username_from_url, allowed| {
            attempts.set(attempts.get() + 1);
            if attempts.get() > MAX_AUTH_ATTEMPTS {
                return Err(git2::Error::from_str("authentication failed"));
            }

            match &self.auth {
                Auth::Token { username, token }
                    if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) =>
                {
                    Cred::userpass_plaintext(username, token)
                }
                Auth::SshAgent { username } if allowed.contains(CredentialType::SSH_KEY) => {
                    Cred::ssh_key_from_agent(username_from_url.unwrap_or(username))
                }
                Auth::SshAgent { username } if allowed.contains(CredentialType::USERNAME) => {
                    Cred::username(username)
                }
                _ => Cred::default(),
            }
        });

        callbacks.push_update_reference(|refname, status| match status {
            Some(message) => Err(git2::Error::from_str(&format!(
                "{refname} rejected by remote: {message}"
            ))),
            None => Ok(()),
        });

        callbacks
    }
}

impl fmt::Display for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn credentials(method: &str, token: Option<&str>) -> Credentials {
        Credentials {
            method: method.into(),
            username: "octo".into(),
            repo: "backup".into(),
            github_token: token.map(Into::into),
            host: None,
            url: None,
        }
    }

    #[test]
    fn ssh_url() {
        let remote = Remote::from_credentials(&credentials("ssh", None)).unwrap();
        assert_eq!(remote.url(), "git@github.com:octo/backup.git");
    }

    #[test]
    fn https_url_never_contains_token() {
        let remote = Remote::from_credentials(&credentials("https", Some("s3cret"))).unwrap();
        assert_eq!(remote.url(), "https://github.com/octo/backup.git");
        assert!(!remote.to_string().contains("s3cret"));
    }

    #[test]
    fn custom_host() {
        let mut creds = credentials("ssh", None);
        creds.host = Some("git.example.org".into());
        let remote = Remote::from_credentials(&creds).unwrap();
        assert_eq!(remote.url(), "git@git.example.org:octo/backup.git");
    }

    #[test]
    fn explicit_url_wins() {
        let mut creds = credentials("ssh", None);
        creds.url = Some("/srv/git/backup.git".into());
        let remote = Remote::from_credentials(&creds).unwrap();
        assert_eq!(remote.url(), "/srv/git/backup.git");
    }

    #[test]
    fn deserializes_from_yaml() {
        let creds: Credentials =
            serde_yaml::from_str("method: https\nusername: octo\nrepo: backup\ngithub_token: t\n")
                .unwrap();
        assert_eq!(creds.github_token.as_deref(), Some("t"));
        assert_eq!(creds.validate().unwrap(), AuthMethod::Https);
    }

    #[test]
    fn unknown_method_is_rejected() {
        let err = credentials("ftp", None).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials { ref method } if method == "ftp"));
        assert!(err.to_string().contains("ssh, https"));
    }

    #[test]
    fn https_requires_token() {
        let err = credentials("https", None).validate().unwrap_err();
        assert!(matches!(err, Error::MissingCredential { ref field, .. } if field == "github_token"));
    }

    #[test]
    fn empty_username_is_rejected() {
        let mut creds = credentials("ssh", None);
        creds.username = " ".into();
        assert!(creds.validate().is_err());
    }

    #[test]
    fn method_is_case_insensitive() {
        assert_eq!("SSH".parse::<AuthMethod>().unwrap(), AuthMethod::Ssh);
    }
}
