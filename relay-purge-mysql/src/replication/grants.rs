//! Privilege check for the session user.
//!
//! Grants are inspected as returned by `SHOW GRANTS FOR CURRENT_USER()`. A privilege only counts
//! when it is granted globally (`ON *.*`), grants scoped to a schema or table are ignored.

use crate::replication::client::AdminClient;

/// Grant line prefix giving every privilege globally.
const ALL_PRIVILEGES_GLOBAL: &str = "GRANT ALL PRIVILEGES ON *.*";

/// Scope marker of a global grant.
const GLOBAL_SCOPE: &str = " ON *.*";

const SUPER: &str = "SUPER";
const RELOAD: &str = "RELOAD";
const REPLICATION_CLIENT: &str = "REPLICATION CLIENT";

/// Global privileges relevant to purging relay logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrivilegeSet {
    pub all_privileges: bool,
    pub super_privilege: bool,
    pub reload: bool,
    pub replication_client: bool,
}

impl PrivilegeSet {
    /// Accumulates the global privileges found across all grant lines.
    ///
    /// A user may hold the required privileges on separate lines, so every line is inspected
    /// unless one grants all privileges globally.
    pub fn from_grants<I, S>(grants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut privileges = PrivilegeSet::default();

        for grant in grants {
            let grant = grant.as_ref();

            if grant.contains(ALL_PRIVILEGES_GLOBAL) {
                privileges.all_privileges = true;
                break;
            }

            if !grant.contains(GLOBAL_SCOPE) {
                continue;
            }

            privileges.super_privilege |= grant.contains(SUPER);
            privileges.reload |= grant.contains(RELOAD);
            privileges.replication_client |= grant.contains(REPLICATION_CLIENT);
        }

        privileges
    }

    /// Returns true if these privileges are sufficient to purge relay logs.
    pub fn allows_purge(&self) -> bool {
        self.all_privileges || (self.super_privilege && self.reload && self.replication_client)
    }
}

/// Returns true if the current user holds the privileges needed to purge relay logs.
pub async fn has_purge_privilege<C>(client: &C) -> Result<bool, sqlx::Error>
where
    C: AdminClient + ?Sized,
{
    let grants = client.fetch_grants().await?;

    Ok(PrivilegeSet::from_grants(&grants).allows_purge())
}
