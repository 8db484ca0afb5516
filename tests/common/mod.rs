#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::mongo::Mongo;

use casfos::app::api_router;
use casfos::auth::models::Role;
use casfos::auth::password::hash_password;
use casfos::config::{AppConfig, BootstrapSettings};
use casfos::models::record::{new_record_id, AuditTrail};
use casfos::models::user::User;
use casfos::seeder;
use casfos::state::AppState;
use casfos::storage::client::{LocalStorageClient, StorageClient};

/// Password given to every account created by [`TestEnv::create_user`].
pub const PASSWORD: &str = "correct-horse";

/// Holds the running MongoDB container and provides the Axum router for
/// integration tests.
///
/// The container and the upload directory live as long as this struct.
pub struct TestEnv {
    _mongo: ContainerAsync<Mongo>,
    _uploads: tempfile::TempDir,
    pub db: mongodb::Database,
    pub state: AppState,
    pub router: Router,
}

impl TestEnv {
    /// Start MongoDB and build the API router wired to it, with a seeded
    /// `admin` account.
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Like [`TestEnv::start`], with `configure` applied to the config first.
    pub async fn start_with(configure: impl FnOnce(&mut AppConfig)) -> Self {
        let mongo_container = Mongo::default()
            .start()
            .await
            .expect("Failed to start MongoDB container");
        let mongo_port = mongo_container
            .get_host_port_ipv4(27017)
            .await
            .expect("Failed to get MongoDB port");
        let mongo_uri = format!("mongodb://127.0.0.1:{}", mongo_port);
        let mongo_client = mongodb::Client::with_uri_str(&mongo_uri)
            .await
            .expect("Failed to connect to MongoDB");
        let mongo_db = mongo_client.database("casfos_test");
        seeder::ensure_indexes(&mongo_db)
            .await
            .expect("Failed to create indexes");

        let uploads = tempfile::tempdir().expect("Failed to create upload dir");
        let storage: Arc<dyn StorageClient> = Arc::new(
            LocalStorageClient::new(uploads.path())
                .await
                .expect("Failed to create storage"),
        );

        let mut config = AppConfig::default();
        config.bootstrap = BootstrapSettings {
            admin_password: Some(PASSWORD.to_string()),
            ..Default::default()
        };
        configure(&mut config);
        let state = AppState::from_database(&mongo_db, storage, Arc::new(config.clone()));
        seeder::seed_admin(state.users.as_ref(), &config.bootstrap)
            .await
            .expect("Failed to seed admin");

        let router = api_router(&config).with_state(state.clone());

        Self {
            _mongo: mongo_container,
            _uploads: uploads,
            db: mongo_db,
            state,
            router,
        }
    }

    /// Build an `axum_test::TestServer` from this environment's router.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .save_cookies()
            .expect_success_by_default()
            .try_build(self.router.clone())
            .expect("Failed to build TestServer")
    }

    /// Build a `TestServer` that does NOT expect success by default (for error tests).
    pub fn server_permissive(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .save_cookies()
            .try_build(self.router.clone())
            .expect("Failed to build TestServer")
    }

    /// Insert a confirmed account directly, bypassing registration.
    pub async fn create_user(&self, username: &str, role: Role) {
        let user = User {
            id: new_record_id(),
            username: username.to_string(),
            name: format!("Test {username}"),
            email: format!("{username}@casfos.test"),
            phone: None,
            role,
            password_hash: hash_password(PASSWORD),
            audit: AuditTrail::submitted(username),
        };
        self.state
            .users
            .upsert_confirmed(&user)
            .await
            .expect("Failed to create user");
    }

    /// A permissive server whose cookie jar holds a session for `username`.
    pub async fn login_as(&self, username: &str) -> axum_test::TestServer {
        let server = self.server_permissive();
        server
            .post("/api/auth/login")
            .json(&serde_json::json!({ "username": username, "password": PASSWORD }))
            .await
            .assert_status_ok();
        server
    }

    /// Create an account with `role` (named after it) and log it in.
    pub async fn session_for(&self, role: Role) -> axum_test::TestServer {
        let username = role.to_string();
        self.create_user(&username, role).await;
        self.login_as(&username).await
    }
}

pub fn chair() -> serde_json::Value {
    serde_json::json!({
        "asset_type": "permanent",
        "category": "Furniture",
        "item_name": "Office Chair"
    })
}

pub fn purchase_body(quantity: u32) -> serde_json::Value {
    serde_json::json!({
        "item": chair(),
        "quantity": quantity,
        "unit_price": 2500.0,
        "supplier_name": "Coimbatore Furnishings",
        "bill_no": "B-1042",
        "purchase_date": "2024-06-03",
        "accessories": { "armrest": "adjustable" }
    })
}

pub fn issue_body(quantity: u32) -> serde_json::Value {
    serde_json::json!({
        "item": chair(),
        "quantity": quantity,
        "issued_to": "Library",
        "purpose": "Reading room"
    })
}

pub fn faculty_body(name: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "faculty_type": "internal",
        "designation": "Assistant Professor",
        "email": "faculty@casfos.test",
        "mobile": "+919876543210",
        "date_of_birth": "1980-05-17",
        "domain_knowledge": ["Silviculture"],
        "publications": [{ "title": "Teak growth", "year": 2019 }]
    })
}
