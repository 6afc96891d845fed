use std::fmt;

use crate::logging::{self, obj, v_str, Domain};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Root,
    Login,
    Dashboard,
    Admin,
}

impl View {
    pub fn path(&self) -> &'static str {
        match self {
            View::Root => "/",
            View::Login => "/login",
            View::Dashboard => "/dashboard",
            View::Admin => "/admin",
        }
    }

    /// Map a navigation path to a view. Unknown paths have no view.
    pub fn from_path(path: &str) -> Option<Self> {
        let trimmed = path.trim();
        let normalized = match trimmed.trim_end_matches('/') {
            "" if trimmed.starts_with('/') => "/",
            other => other,
        };
        match normalized {
            "/" => Some(View::Root),
            "/login" => Some(View::Login),
            "/dashboard" => Some(View::Dashboard),
            "/admin" => Some(View::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Redirect(View),
}

/// Decide whether `view` is reachable with `session`. Pure; call it on every
/// navigation.
pub fn can_access(view: View, session: &Session) -> Access {
    match view {
        View::Root => Access::Redirect(View::Login),
        View::Login if session.is_authenticated() => Access::Redirect(View::Dashboard),
        View::Login => Access::Allow,
        View::Dashboard if session.is_authenticated() => Access::Allow,
        View::Admin if session.is_admin() => Access::Allow,
        View::Dashboard | View::Admin => Access::Redirect(View::Login),
    }
}

/// Follow redirects from `view` to the view that finally renders.
pub fn resolve(view: View, session: &Session) -> View {
    let mut current = view;
    // Every chain in the table above ends within two hops.
    for _ in 0..4 {
        match can_access(current, session) {
            Access::Allow => break,
            Access::Redirect(next) => {
                logging::debug(
                    Domain::Route,
                    "redirect",
                    obj(&[("from", v_str(current.path())), ("to", v_str(next.path()))]),
                );
                current = next;
            }
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;

    fn sessions_without_token() -> Vec<Session> {
        vec![
            Session::empty(),
            Session {
                access_token: None,
                refresh_token: Some("r".to_string()),
                role: Some(Role::Admin),
            },
            Session {
                access_token: None,
                refresh_token: None,
                role: Some(Role::User),
            },
        ]
    }

    #[test]
    fn no_token_redirects_protected_views_to_login() {
        for s in sessions_without_token() {
            assert_eq!(can_access(View::Dashboard, &s), Access::Redirect(View::Login));
            assert_eq!(can_access(View::Admin, &s), Access::Redirect(View::Login));
            assert_eq!(can_access(View::Login, &s), Access::Allow);
        }
    }

    #[test]
    fn non_admin_blocked_from_admin_only() {
        let user = Session::authenticated("a", "r", Role::User);
        assert_eq!(can_access(View::Admin, &user), Access::Redirect(View::Login));
        assert_eq!(can_access(View::Dashboard, &user), Access::Allow);

        let roleless = Session {
            access_token: Some("a".to_string()),
            refresh_token: None,
            role: None,
        };
        assert_eq!(can_access(View::Admin, &roleless), Access::Redirect(View::Login));
        assert_eq!(can_access(View::Dashboard, &roleless), Access::Allow);
    }

    #[test]
    fn admin_reaches_everything_but_login() {
        let admin = Session::authenticated("a", "r", Role::Admin);
        assert_eq!(can_access(View::Admin, &admin), Access::Allow);
        assert_eq!(can_access(View::Dashboard, &admin), Access::Allow);
        assert_eq!(can_access(View::Login, &admin), Access::Redirect(View::Dashboard));
    }

    #[test]
    fn root_always_goes_to_login() {
        assert_eq!(can_access(View::Root, &Session::empty()), Access::Redirect(View::Login));
        let admin = Session::authenticated("a", "r", Role::Admin);
        assert_eq!(can_access(View::Root, &admin), Access::Redirect(View::Login));
    }

    #[test]
    fn resolve_follows_chain() {
        let user = Session::authenticated("a", "r", Role::User);
        // "/" -> login -> dashboard for a signed-in user; admin bounces via login too.
        assert_eq!(resolve(View::Root, &user), View::Dashboard);
        assert_eq!(resolve(View::Admin, &user), View::Dashboard);
        assert_eq!(resolve(View::Admin, &Session::empty()), View::Login);
    }

    #[test]
    fn paths_parse() {
        assert_eq!(View::from_path("/"), Some(View::Root));
        assert_eq!(View::from_path("/dashboard/"), Some(View::Dashboard));
        assert_eq!(View::from_path("/admin"), Some(View::Admin));
        assert_eq!(View::from_path("/login"), Some(View::Login));
        assert_eq!(View::from_path("/admin-panel"), None);
        for v in [View::Root, View::Login, View::Dashboard, View::Admin] {
            assert_eq!(View::from_path(v.path()), Some(v));
        }
    }
}
