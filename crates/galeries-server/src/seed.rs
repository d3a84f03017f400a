use anyhow::Result;
use chrono::Utc;
use tracing::info;

use galeries_api::auth::hash_password;
use galeries_db::Database;
use galeries_db::users::NewUser;
use galeries_types::models::Role;

use crate::config::AdminSeed;

/// Create the superAdmin account unless one already exists. Returns whether
/// an account was created.
pub fn seed_super_admin(db: &Database, seed: &AdminSeed) -> Result<bool> {
    if db.has_super_admin()? {
        return Ok(false);
    }

    let new = NewUser {
        user_name: seed.user_name.clone(),
        pseudonym: seed.user_name.clone(),
        email: seed.email.to_lowercase(),
        password_hash: hash_password(&seed.password)?,
    };
    let user = db.insert_user(&new, Role::SuperAdmin, Utc::now())?;
    info!("Created superAdmin {} ({})", user.user_name, user.id);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_only_once() {
        let db = Database::open_in_memory().unwrap();
        let seed = AdminSeed {
            user_name: "root".into(),
            email: "Root@Galeries.app".into(),
            password: "Sup3rSecret".into(),
        };

        assert!(seed_super_admin(&db, &seed).unwrap());
        assert!(!seed_super_admin(&db, &seed).unwrap());

        let root = db.get_user_by_login("root@galeries.app").unwrap().unwrap();
        assert_eq!(root.role, Role::SuperAdmin);
    }
}
