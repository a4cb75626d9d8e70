use super::client::{BackendClient, Credential, CredentialKind, RequestSession};
use super::cookies::SessionCookies;
use super::session;
use crate::config::env::{ConfigurationError, EnvResolver, KeyScope, SITE_URL};
use std::time::Duration;

/// Builds backend handles. Every constructor resolves the environment once and
/// either returns a complete handle or a [`ConfigurationError`].
#[derive(Clone)]
pub struct ClientFactory {
    resolver: EnvResolver,
    http: reqwest::Client,
}

impl ClientFactory {
    pub fn new(resolver: EnvResolver, timeout: Duration) -> Result<Self, reqwest::Error> {
        // No cookie store: the only cookie state is the per-request session.
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { resolver, http })
    }

    pub fn resolver(&self) -> &EnvResolver {
        &self.resolver
    }

    /// Public key, no session. For anonymous reads.
    pub fn browser_client(&self) -> Result<BackendClient, ConfigurationError> {
        let env = self.resolver.resolve(KeyScope::Public)?;
        Ok(BackendClient::new(
            self.http.clone(),
            env.endpoint,
            Credential::new(CredentialKind::Public, env.public_key),
            None,
        ))
    }

    /// Public key bound to one request's cookies. Build one per request.
    pub fn server_client(
        &self,
        cookies: SessionCookies,
    ) -> Result<BackendClient, ConfigurationError> {
        let env = self.resolver.resolve(KeyScope::Public)?;
        let session = RequestSession::new(
            cookies,
            session::cookie_name(&env.endpoint),
            self.secure_cookies(),
        );

        Ok(BackendClient::new(
            self.http.clone(),
            env.endpoint,
            Credential::new(CredentialKind::Public, env.public_key),
            Some(session),
        ))
    }

    /// Secret key, no session. Server-side paths only.
    pub fn privileged_client(&self) -> Result<BackendClient, ConfigurationError> {
        let env = self.resolver.resolve(KeyScope::Privileged)?;
        let secret_key = env
            .secret_key
            .ok_or(ConfigurationError::Missing(crate::config::env::BACKEND_SERVICE_ROLE_KEY))?;

        Ok(BackendClient::new(
            self.http.clone(),
            env.endpoint,
            Credential::new(CredentialKind::ServiceRole, secret_key),
            None,
        ))
    }

    /// Session cookies are `Secure` when the public site is served over https.
    fn secure_cookies(&self) -> bool {
        self.resolver
            .require_url(SITE_URL)
            .map(|url| url.scheme() == "https")
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::cookies::ResponseCookies;
    use crate::config::env::{MapEnv, BACKEND_ANON_KEY, BACKEND_SERVICE_ROLE_KEY, BACKEND_URL};
    use axum::http::HeaderMap;
    use std::sync::Arc;

    fn factory(env: MapEnv) -> ClientFactory {
        ClientFactory::new(EnvResolver::new(Arc::new(env)), Duration::from_secs(5)).unwrap()
    }

    fn full_env() -> MapEnv {
        MapEnv::new()
            .with(BACKEND_URL, "http://localhost:54321")
            .with(BACKEND_ANON_KEY, "anon-key")
            .with(BACKEND_SERVICE_ROLE_KEY, "service-role-key")
    }

    #[test]
    fn privileged_handle_carries_the_secret_key() {
        let client = factory(full_env()).privileged_client().unwrap();
        assert_eq!(client.credential().kind(), CredentialKind::ServiceRole);
        assert_eq!(client.credential().expose(), "service-role-key");
        assert!(!client.snapshot().session_bound);
    }

    #[test]
    fn browser_and_server_handles_use_the_public_key() {
        let f = factory(full_env());
        let browser = f.browser_client().unwrap();
        assert_eq!(browser.credential().expose(), "anon-key");

        let cookies = SessionCookies::from_headers(&HeaderMap::new(), ResponseCookies::new());
        let server = f.server_client(cookies).unwrap();
        assert_eq!(server.credential().kind(), CredentialKind::Public);
        assert!(server.snapshot().session_bound);
    }

    #[test]
    fn privileged_needs_the_secret_but_public_does_not() {
        let f = factory(
            MapEnv::new()
                .with(BACKEND_URL, "http://localhost:54321")
                .with(BACKEND_ANON_KEY, "anon-key"),
        );
        assert!(f.browser_client().is_ok());
        assert_eq!(
            f.privileged_client().unwrap_err(),
            ConfigurationError::Missing(BACKEND_SERVICE_ROLE_KEY)
        );
    }

    #[test]
    fn empty_endpoint_fails_construction() {
        let f = factory(MapEnv::new().with(BACKEND_URL, "").with(BACKEND_ANON_KEY, "abc"));
        let cookies = SessionCookies::from_headers(&HeaderMap::new(), ResponseCookies::new());
        assert_eq!(
            f.server_client(cookies).unwrap_err(),
            ConfigurationError::Missing(BACKEND_URL)
        );
    }

    #[test]
    fn secure_flag_follows_site_url() {
        assert!(!factory(full_env()).secure_cookies());
        assert!(factory(full_env().with(SITE_URL, "https://atelier.example")).secure_cookies());
    }
}
