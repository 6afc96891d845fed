use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, OptionalExtension};

use crate::logging::{self, obj, v_str, Domain};
use crate::session::{Role, Session};

const KEY_ACCESS: &str = "access_token";
const KEY_REFRESH: &str = "refresh_token";
const KEY_ROLE: &str = "user_role";

#[derive(Debug, thiserror::Error)]
#[error("credential store: {0}")]
pub struct StoreError(#[from] rusqlite::Error);

/// Persisted holder for the current [`Session`].
///
/// Values are kept verbatim in a `credentials(key, value)` table. Tokens are
/// never inspected here.
pub struct CredentialStore {
    conn: Mutex<Connection>,
}

impl CredentialStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS credentials (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reconstruct the session. Unreadable storage yields an empty session.
    pub fn load(&self) -> Session {
        match self.try_load() {
            Ok(session) => session,
            Err(err) => {
                logging::warn(
                    Domain::Store,
                    "load_failed",
                    obj(&[("error", v_str(&err.to_string()))]),
                );
                Session::empty()
            }
        }
    }

    fn try_load(&self) -> Result<Session, StoreError> {
        let conn = self.conn();
        let get = |key: &str| -> Result<Option<String>, StoreError> {
            Ok(conn
                .query_row("SELECT value FROM credentials WHERE key = ?1", params![key], |row| row.get(0))
                .optional()?)
        };
        let role = match get(KEY_ROLE)? {
            Some(raw) => match raw.parse::<Role>() {
                Ok(role) => Some(role),
                Err(reason) => {
                    logging::warn(Domain::Store, "bad_role", obj(&[("reason", v_str(&reason))]));
                    None
                }
            },
            None => None,
        };
        Ok(Session {
            access_token: get(KEY_ACCESS)?,
            refresh_token: get(KEY_REFRESH)?,
            role,
        })
    }

    /// Replace everything stored with `session`. Absent fields are removed.
    pub fn save(&self, session: &Session) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM credentials", [])?;
        let role = session.role.map(|r| r.as_str().to_string());
        for (key, value) in [
            (KEY_ACCESS, session.access_token.as_ref()),
            (KEY_REFRESH, session.refresh_token.as_ref()),
            (KEY_ROLE, role.as_ref()),
        ] {
            if let Some(value) = value {
                tx.execute(
                    "INSERT INTO credentials (key, value) VALUES (?1, ?2)",
                    params![key, value],
                )?;
            }
        }
        tx.commit()?;
        logging::debug(
            Domain::Store,
            "saved",
            obj(&[
                ("has_access", serde_json::json!(session.access_token.is_some())),
                ("has_refresh", serde_json::json!(session.refresh_token.is_some())),
                ("role", logging::v_opt(session.role.map(|r| r.as_str()))),
            ]),
        );
        Ok(())
    }

    /// Overwrite only the access token, leaving refresh token and role alone.
    ///
    /// The write only lands while `refresh_token` is still the stored refresh
    /// token. Returns false when the session was cleared or replaced since the
    /// refresh began, in which case nothing is written.
    pub fn set_access_token(&self, token: &str, refresh_token: &str) -> Result<bool, StoreError> {
        let changed = self.conn().execute(
            "INSERT INTO credentials (key, value)
             SELECT ?1, ?2 WHERE EXISTS (
                 SELECT 1 FROM credentials WHERE key = ?3 AND value = ?4
             )
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![KEY_ACCESS, token, KEY_REFRESH, refresh_token],
        )?;
        Ok(changed > 0)
    }

    /// Remove all credentials. Safe to call on an empty store.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.conn().execute("DELETE FROM credentials", [])?;
        logging::debug(Domain::Store, "cleared", obj(&[]));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_loads_empty_session() {
        let store = CredentialStore::in_memory().unwrap();
        assert_eq!(store.load(), Session::empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = CredentialStore::in_memory().unwrap();
        let sessions = [
            Session::authenticated("acc", "ref", Role::Admin),
            Session::authenticated("acc-2", "ref-2", Role::User),
            Session {
                access_token: None,
                refresh_token: Some("only-refresh".to_string()),
                role: None,
            },
            Session::empty(),
        ];
        for s in sessions {
            store.save(&s).unwrap();
            assert_eq!(store.load(), s);
        }
    }

    #[test]
    fn save_overwrites_and_drops_absent_fields() {
        let store = CredentialStore::in_memory().unwrap();
        store.save(&Session::authenticated("a", "r", Role::Admin)).unwrap();
        let partial = Session {
            access_token: Some("b".to_string()),
            refresh_token: None,
            role: Some(Role::User),
        };
        store.save(&partial).unwrap();
        assert_eq!(store.load(), partial);
    }

    #[test]
    fn clear_is_idempotent() {
        let store = CredentialStore::in_memory().unwrap();
        store.save(&Session::authenticated("a", "r", Role::User)).unwrap();
        store.clear().unwrap();
        let once = store.load();
        store.clear().unwrap();
        assert_eq!(store.load(), once);
        assert!(once.is_empty());
    }

    #[test]
    fn set_access_token_keeps_refresh_and_role() {
        let store = CredentialStore::in_memory().unwrap();
        store.save(&Session::authenticated("old", "r", Role::Admin)).unwrap();
        assert!(store.set_access_token("new", "r").unwrap());
        assert_eq!(store.load(), Session::authenticated("new", "r", Role::Admin));
    }

    #[test]
    fn set_access_token_skips_cleared_or_replaced_session() {
        let store = CredentialStore::in_memory().unwrap();
        store.save(&Session::authenticated("old", "r", Role::Admin)).unwrap();
        store.clear().unwrap();
        assert!(!store.set_access_token("new", "r").unwrap());
        assert!(store.load().is_empty());

        let other = Session::authenticated("theirs", "r-2", Role::User);
        store.save(&other).unwrap();
        assert!(!store.set_access_token("new", "r").unwrap());
        assert_eq!(store.load(), other);
    }

    #[test]
    fn unknown_role_loads_as_absent() {
        let store = CredentialStore::in_memory().unwrap();
        store
            .conn()
            .execute("INSERT INTO credentials (key, value) VALUES ('user_role', 'root')", [])
            .unwrap();
        assert_eq!(store.load().role, None);
    }
}
