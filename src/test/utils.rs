#[cfg(test)]
pub mod test_db {
    use chrono::NaiveDate;
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::path::Path;
    use std::time::Duration;

    use crate::auth::Role;
    use crate::db::{insert_client, insert_roster_interval, insert_user};
    use crate::error::AppError;
    use crate::models::{Side, Status};
    use crate::validation::{ClientData, UserData};

    pub fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid test date")
    }

    pub struct TestUser {
        pub username: String,
        pub side: Side,
        pub role: Role,
        pub status: Status,
    }

    pub struct TestClient {
        pub fname: String,
        pub lname: String,
        pub side: Side,
        pub status: Status,
    }

    pub struct TestRoster {
        pub fname: String,
        pub start: NaiveDate,
        pub end: Option<NaiveDate>,
    }

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        clients: Vec<TestClient>,
        roster: Vec<TestRoster>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn user(mut self, username: &str, role: Role, side: Side, status: Status) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                side,
                role,
                status,
            });
            self
        }

        pub fn admin(self, username: &str) -> Self {
            self.user(username, Role::Admin, Side::Both, Status::Active)
        }

        pub fn staff(self, username: &str) -> Self {
            self.user(username, Role::User, Side::One, Status::Active)
        }

        pub fn deactivated(self, username: &str) -> Self {
            self.user(username, Role::User, Side::One, Status::Deactivated)
        }

        /// Clients are keyed by first name in the resulting `TestDb`.
        pub fn client(mut self, fname: &str, lname: &str, side: Side) -> Self {
            self.clients.push(TestClient {
                fname: fname.to_string(),
                lname: lname.to_string(),
                side,
                status: Status::Active,
            });
            self
        }

        pub fn roster(mut self, fname: &str, start: &str, end: Option<&str>) -> Self {
            self.roster.push(TestRoster {
                fname: fname.to_string(),
                start: date(start),
                end: end.map(date),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?;

            self.seed(pool).await
        }

        /// File-backed WAL database with several connections, for tests that
        /// need concurrent writers to contend for the lock.
        pub async fn build_shared(self, path: &Path) -> Result<TestDb, AppError> {
            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(Duration::from_secs(1));
            let pool = SqlitePoolOptions::new()
                .max_connections(4)
                .connect_with(options)
                .await?;

            self.seed(pool).await
        }

        async fn seed(self, pool: Pool<Sqlite>) -> Result<TestDb, AppError> {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();
            let mut client_id_map: HashMap<String, i64> = HashMap::new();

            let mut conn = pool.acquire().await?;

            for user in &self.users {
                let data = UserData {
                    fname: format!("{}_first", user.username),
                    lname: format!("{}_last", user.username),
                    username: user.username.clone(),
                    side: user.side,
                    role: user.role,
                    status: user.status,
                };
                let id = insert_user(&mut *conn, &data).await?;
                user_id_map.insert(user.username.clone(), id);
            }

            for client in &self.clients {
                let data = ClientData {
                    fname: client.fname.clone(),
                    lname: client.lname.clone(),
                    side: client.side,
                    status: client.status,
                };
                let id = insert_client(&mut *conn, &data).await?;
                client_id_map.insert(client.fname.clone(), id);
            }

            for entry in &self.roster {
                let cid = client_id_map
                    .get(&entry.fname)
                    .copied()
                    .ok_or_else(|| AppError::NotFound(format!("No test client {}", entry.fname)))?;
                insert_roster_interval(&mut *conn, cid, entry.start, entry.end).await?;
            }

            drop(conn);

            Ok(TestDb {
                pool,
                user_id_map,
                client_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
        pub client_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> i64 {
            self.user_id_map[username]
        }

        pub fn client_id(&self, fname: &str) -> i64 {
            self.client_id_map[fname]
        }

        pub async fn count(&self, table: &str) -> i64 {
            sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&self.pool)
                .await
                .expect("count query")
        }
    }
}

#[cfg(test)]
pub mod test_utils {
    use async_trait::async_trait;
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::{Value, json};
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::test_db::{TestDb, TestDbBuilder};
    use crate::config::{
        AppConfig, CognitoConfig, CorsConfig, Environment, S3Config, ServerConfig, SessionConfig,
        SmtpConfig, TelemetryConfig,
    };
    use crate::error::AppError;
    use crate::init_rocket;
    use crate::integrations::{
        AuthOutcome, DocumentStore, IdentityError, IdentityProvider, Integrations, Mailer,
        Notification,
    };

    pub const STANDARD_PASSWORD: &str = "Passw0rd!";
    pub const CHALLENGE_SESSION: &str = "challenge-session-token";
    pub const TEST_SECRET_KEY: &str = "hPRYyVRiMyxpw5sBB1XeCMN1kFsDCqKvBi2QJxBVHQk=";
    pub const APP_ORIGIN: &str = "http://localhost:5173";
    pub const WEBSITE_ORIGIN: &str = "http://localhost:4321";

    pub fn test_config() -> AppConfig {
        AppConfig {
            env: Environment::Development,
            server: ServerConfig {
                address: "127.0.0.1".to_string(),
                port: 8000,
            },
            database_url: "sqlite::memory:".to_string(),
            session: SessionConfig {
                secret: TEST_SECRET_KEY.to_string(),
                duration: Duration::from_secs(60 * 60),
                cross_site: false,
            },
            cognito: CognitoConfig {
                client_id: "test-client".to_string(),
                user_pool_id: "test-pool".to_string(),
                region: "us-east-1".to_string(),
                temp_password: "Temp0rary!".to_string(),
                timeout: Duration::from_secs(1),
            },
            cors: CorsConfig {
                internal_origin: APP_ORIGIN.to_string(),
                public_origin: WEBSITE_ORIGIN.to_string(),
            },
            smtp: SmtpConfig {
                host: "localhost".to_string(),
                port: 587,
                username: "smtp".to_string(),
                password: "smtp".to_string(),
                sender: "noreply@example.com".to_string(),
                recipient: "staff@example.com".to_string(),
            },
            s3: S3Config {
                region: "us-east-1".to_string(),
                bucket: "test-bucket".to_string(),
            },
            max_application_files: 2,
            telemetry: TelemetryConfig {
                otlp_endpoint: None,
                otlp_headers: None,
            },
        }
    }

    /// In-memory identity provider. Any username authenticates with
    /// `STANDARD_PASSWORD` unless configured otherwise.
    #[derive(Default)]
    pub struct MockIdentityProvider {
        pub accounts: Mutex<HashMap<String, String>>,
        pub groups: Mutex<HashMap<String, String>>,
        pub challenged: Mutex<HashSet<String>>,
        pub unavailable: Mutex<bool>,
        pub fail_create: Mutex<HashSet<String>>,
        pub fail_group: Mutex<HashSet<String>>,
        pub fail_delete: Mutex<HashSet<String>>,
        pub deleted: Mutex<Vec<String>>,
    }

    impl MockIdentityProvider {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn challenge(&self, username: &str) {
            self.challenged.lock().unwrap().insert(username.to_string());
        }

        pub fn set_unavailable(&self) {
            *self.unavailable.lock().unwrap() = true;
        }

        pub fn fail_create_for(&self, username: &str) {
            self.fail_create.lock().unwrap().insert(username.to_string());
        }

        pub fn fail_group_for(&self, username: &str) {
            self.fail_group.lock().unwrap().insert(username.to_string());
        }

        pub fn fail_delete_for(&self, username: &str) {
            self.fail_delete.lock().unwrap().insert(username.to_string());
        }

        pub fn has_account(&self, username: &str) -> bool {
            self.accounts.lock().unwrap().contains_key(username)
        }

        pub fn group_of(&self, username: &str) -> Option<String> {
            self.groups.lock().unwrap().get(username).cloned()
        }

        pub fn deleted(&self) -> Vec<String> {
            self.deleted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IdentityProvider for MockIdentityProvider {
        async fn authenticate(
            &self,
            username: &str,
            password: &str,
        ) -> Result<AuthOutcome, IdentityError> {
            if *self.unavailable.lock().unwrap() {
                return Err(IdentityError::Service(
                    "Service unavailable".to_string(),
                ));
            }

            if self.challenged.lock().unwrap().contains(username) {
                return Ok(AuthOutcome::Challenge {
                    name: "NEW_PASSWORD_REQUIRED".to_string(),
                    session: CHALLENGE_SESSION.to_string(),
                });
            }

            let expected = self
                .accounts
                .lock()
                .unwrap()
                .get(username)
                .cloned()
                .unwrap_or_else(|| STANDARD_PASSWORD.to_string());

            if expected == password {
                Ok(AuthOutcome::Authenticated)
            } else {
                Err(IdentityError::NotAuthorized)
            }
        }

        async fn complete_new_password_challenge(
            &self,
            username: &str,
            new_password: &str,
            session: &str,
        ) -> Result<(), IdentityError> {
            if *self.unavailable.lock().unwrap() {
                return Err(IdentityError::Service(
                    "Service unavailable".to_string(),
                ));
            }

            let mut challenged = self.challenged.lock().unwrap();
            if session != CHALLENGE_SESSION || !challenged.remove(username) {
                return Err(IdentityError::NotAuthorized);
            }

            self.accounts
                .lock()
                .unwrap()
                .insert(username.to_string(), new_password.to_string());
            Ok(())
        }

        async fn create_user(
            &self,
            username: &str,
            temporary_password: &str,
        ) -> Result<(), IdentityError> {
            if self.fail_create.lock().unwrap().contains(username) {
                return Err(IdentityError::Service("UsernameExistsException".to_string()));
            }

            self.accounts
                .lock()
                .unwrap()
                .insert(username.to_string(), temporary_password.to_string());
            Ok(())
        }

        async fn add_user_to_group(&self, username: &str, group: &str) -> Result<(), IdentityError> {
            if self.fail_group.lock().unwrap().contains(username) {
                return Err(IdentityError::Service("ResourceNotFoundException".to_string()));
            }

            self.groups
                .lock()
                .unwrap()
                .insert(username.to_string(), group.to_string());
            Ok(())
        }

        async fn delete_user(&self, username: &str) -> Result<(), IdentityError> {
            if self.fail_delete.lock().unwrap().contains(username) {
                return Err(IdentityError::Service("InternalErrorException".to_string()));
            }

            self.accounts.lock().unwrap().remove(username);
            self.deleted.lock().unwrap().push(username.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, notification: Notification) -> Result<(), AppError> {
            self.sent.lock().unwrap().push(notification);
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct MemoryDocumentStore {
        pub objects: Mutex<Vec<(String, String, Vec<u8>)>>,
        pub fail: Mutex<bool>,
    }

    #[async_trait]
    impl DocumentStore for MemoryDocumentStore {
        async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), AppError> {
            if *self.fail.lock().unwrap() {
                return Err(AppError::ExternalService("bucket unavailable".to_string()));
            }

            self.objects
                .lock()
                .unwrap()
                .push((key.to_string(), content_type.to_string(), bytes));
            Ok(())
        }
    }

    /// Handles on the doubles behind a test client.
    pub struct TestServices {
        pub identity: Arc<MockIdentityProvider>,
        pub mailer: Arc<RecordingMailer>,
        pub documents: Arc<MemoryDocumentStore>,
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestServices, TestDb) {
        let services = TestServices {
            identity: MockIdentityProvider::new(),
            mailer: Arc::new(RecordingMailer::default()),
            documents: Arc::new(MemoryDocumentStore::default()),
        };

        let integrations = Integrations {
            identity: services.identity.clone(),
            mailer: services.mailer.clone(),
            documents: services.documents.clone(),
        };

        let rocket = init_rocket(test_db.pool.clone(), test_config(), integrations);
        let client = Client::tracked(rocket)
            .await
            .expect("valid rocket instance");

        (client, services, test_db)
    }

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .admin("admin_user")
            .staff("staff_user")
            .deactivated("gone_user")
            .build()
            .await
            .expect("Failed to build test database")
    }

    pub async fn login_test_user(client: &Client, username: &str) -> Status {
        client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": username,
                    "password": STANDARD_PASSWORD
                })
                .to_string(),
            )
            .dispatch()
            .await
            .status()
    }

    pub async fn json_body(response: rocket::local::asynchronous::LocalResponse<'_>) -> Value {
        let body = response.into_string().await.expect("response body");
        serde_json::from_str(&body).expect("JSON response body")
    }

    pub const BOUNDARY: &str = "X-DAYPROGRAM-BOUNDARY";

    pub struct Upload<'a> {
        pub name: &'a str,
        pub content_type: &'a str,
        pub bytes: &'a [u8],
    }

    pub fn multipart_content_type() -> ContentType {
        ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY))
    }

    pub fn multipart_body(fields: &[(&str, &str)], files: &[Upload<'_>]) -> Vec<u8> {
        let mut body = Vec::new();

        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }

        for file in files {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    BOUNDARY, file.name, file.content_type
                )
                .as_bytes(),
            );
            body.extend_from_slice(file.bytes);
            body.extend_from_slice(b"\r\n");
        }

        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }
}
