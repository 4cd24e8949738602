#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{TimeDelta, Utc};
    use rocket::tokio;
    use sqlx::{Pool, Sqlite};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use crate::auth::{Role, SessionData, generate_sid};
    use crate::db;
    use crate::error::AppError;
    use crate::integrations::{AuthOutcome, IdentityError, IdentityProvider};
    use crate::models::{Side, Status};
    use crate::services;
    use crate::test::test_db::TestDbBuilder;
    use crate::test::test_utils::test_config;
    use crate::validation::{UserData, UserRef};

    /// Identity provider that writes to the database from inside every account
    /// call, the way a concurrent request would while the provider is slow.
    struct WritingIdentity {
        pool: Pool<Sqlite>,
        writes: Mutex<Vec<(&'static str, Result<(), String>)>>,
        deleted: Mutex<Vec<String>>,
        claim_username: Mutex<Option<String>>,
    }

    impl WritingIdentity {
        fn new(pool: Pool<Sqlite>) -> Self {
            Self {
                pool,
                writes: Mutex::new(Vec::new()),
                deleted: Mutex::new(Vec::new()),
                claim_username: Mutex::new(None),
            }
        }

        async fn write(&self, call: &'static str) {
            let expire = (Utc::now() + TimeDelta::hours(1)).naive_utc();
            let result = db::create_session(&self.pool, &generate_sid(), &SessionData { uid: 1 }, expire)
                .await
                .map_err(|err| err.to_string());
            self.writes.lock().unwrap().push((call, result));
        }

        fn writes(&self) -> Vec<(&'static str, Result<(), String>)> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IdentityProvider for WritingIdentity {
        async fn authenticate(&self, _: &str, _: &str) -> Result<AuthOutcome, IdentityError> {
            Ok(AuthOutcome::Authenticated)
        }

        async fn complete_new_password_challenge(
            &self,
            _: &str,
            _: &str,
            _: &str,
        ) -> Result<(), IdentityError> {
            Ok(())
        }

        async fn create_user(&self, _: &str, _: &str) -> Result<(), IdentityError> {
            self.write("create_user").await;

            let claim = self.claim_username.lock().unwrap().take();
            if let Some(claimed) = claim {
                let mut conn = self.pool.acquire().await.unwrap();
                db::insert_user(&mut *conn, &user_data(&claimed)).await.unwrap();
            }
            Ok(())
        }

        async fn add_user_to_group(&self, _: &str, _: &str) -> Result<(), IdentityError> {
            self.write("add_user_to_group").await;
            Ok(())
        }

        async fn delete_user(&self, username: &str) -> Result<(), IdentityError> {
            self.write("delete_user").await;
            self.deleted.lock().unwrap().push(username.to_string());
            Ok(())
        }
    }

    fn user_data(username: &str) -> UserData {
        UserData {
            fname: "New".to_string(),
            lname: "Staff".to_string(),
            username: username.to_string(),
            side: Side::One,
            role: Role::User,
            status: Status::Active,
        }
    }

    fn db_path() -> PathBuf {
        std::env::temp_dir().join(format!("attendance_test_{}.db", rand::random::<u64>()))
    }

    async fn cleanup(pool: Pool<Sqlite>, path: &Path) {
        pool.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[tokio::test]
    async fn test_register_leaves_database_writable_during_provider_calls() {
        let path = db_path();
        let test_db = TestDbBuilder::new()
            .admin("admin_user")
            .build_shared(&path)
            .await
            .expect("Failed to build shared test database");
        let identity = WritingIdentity::new(test_db.pool.clone());

        let id = services::auth::register(
            &test_db.pool,
            &identity,
            &test_config().cognito,
            &user_data("new_staff"),
        )
        .await
        .expect("registration succeeds");

        let writes = identity.writes();
        assert_eq!(writes.len(), 2);
        for (call, result) in &writes {
            assert!(result.is_ok(), "{} could not write: {:?}", call, result);
        }

        let user = db::get_user(&test_db.pool, id).await.unwrap();
        assert_eq!(user.username, "new_staff");
        assert_eq!(test_db.count("sessions").await, 2);

        cleanup(test_db.pool, &path).await;
    }

    #[tokio::test]
    async fn test_delete_users_leaves_database_writable_during_provider_calls() {
        let path = db_path();
        let test_db = TestDbBuilder::new()
            .admin("admin_user")
            .staff("staff_one")
            .staff("staff_two")
            .build_shared(&path)
            .await
            .expect("Failed to build shared test database");
        let identity = WritingIdentity::new(test_db.pool.clone());

        let targets: Vec<UserRef> = ["staff_one", "staff_two"]
            .iter()
            .map(|username| UserRef {
                id: test_db.user_id(username),
                username: username.to_string(),
            })
            .collect();

        services::users::delete_users(&test_db.pool, &identity, &targets)
            .await
            .expect("deletion succeeds");

        let writes = identity.writes();
        assert_eq!(writes.len(), 2);
        for (call, result) in &writes {
            assert!(result.is_ok(), "{} could not write: {:?}", call, result);
        }
        assert_eq!(test_db.count("users").await, 1);

        cleanup(test_db.pool, &path).await;
    }

    #[tokio::test]
    async fn test_register_removes_provider_account_when_username_taken_meanwhile() {
        let path = db_path();
        let test_db = TestDbBuilder::new()
            .admin("admin_user")
            .build_shared(&path)
            .await
            .expect("Failed to build shared test database");
        let identity = WritingIdentity::new(test_db.pool.clone());
        *identity.claim_username.lock().unwrap() = Some("new_staff".to_string());

        let err = services::auth::register(
            &test_db.pool,
            &identity,
            &test_config().cognito,
            &user_data("new_staff"),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Conflict(ref message) if message == "Username already exists"));
        assert_eq!(identity.deleted.lock().unwrap().clone(), vec!["new_staff"]);
        assert_eq!(test_db.count("users").await, 2);

        cleanup(test_db.pool, &path).await;
    }
}
