//! Navigation rules that depend on authentication.

use crate::auth::AuthFacade;

pub const DEFAULT_LOGIN_ROUTE: &str = "/auth";
pub const DEFAULT_HOME_ROUTE: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Redirect(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuard {
    login_route: String,
    home_route: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_ROUTE, DEFAULT_HOME_ROUTE)
    }
}

impl RouteGuard {
    pub fn new(login_route: impl Into<String>, home_route: impl Into<String>) -> Self {
        Self {
            login_route: login_route.into(),
            home_route: home_route.into(),
        }
    }

    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    pub fn home_route(&self) -> &str {
        &self.home_route
    }

    /// Decide a navigation to `path`.
    ///
    /// The login route is always reachable; anything else needs a session.
    pub fn before_each(&self, path: &str, authenticated: bool) -> RouteDecision {
        if path == self.login_route || authenticated {
            RouteDecision::Allow
        } else {
            RouteDecision::Redirect(self.login_route.clone())
        }
    }

    /// Where to go when the auth state changes while on `current_path`.
    ///
    /// Signed-out users are sent to the login route, signed-in users are
    /// sent away from it.
    pub fn on_auth_change(&self, current_path: &str, authenticated: bool) -> RouteDecision {
        let on_login = current_path == self.login_route;
        match (authenticated, on_login) {
            (false, false) => RouteDecision::Redirect(self.login_route.clone()),
            (true, true) => RouteDecision::Redirect(self.home_route.clone()),
            _ => RouteDecision::Allow,
        }
    }

    /// Final destination for `path`: the navigation guard first, then the
    /// auth-change redirect for whatever the guard let through.
    pub fn resolve(&self, path: &str, authenticated: bool) -> RouteDecision {
        match self.before_each(path, authenticated) {
            RouteDecision::Allow => self.on_auth_change(path, authenticated),
            redirect => redirect,
        }
    }

    /// `resolve` using the facade's live authentication check.
    pub fn check(&self, path: &str, auth: &AuthFacade) -> RouteDecision {
        self.resolve(path, auth.is_authenticated())
    }
}
