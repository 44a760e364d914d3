#![allow(dead_code)]

use base64::{engine::general_purpose, Engine as _};
use billing_desk::config::{
    AuthSettings, BackendSettings, DocumentSettings, ServerSettings, Settings, SmtpSettings,
    TelemetrySettings,
};
use billing_desk::services::mailer::{Mailer, MockMailer};
use billing_desk::startup::Application;
use reqwest::StatusCode;
use secrecy::Secret;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub backend: MockServer,
    pub auth: MockServer,
    pub mailer: Arc<MockMailer>,
    pub client: reqwest::Client,
}

pub fn settings(backend_url: String, auth_url: String) -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            secure_cookies: false,
            session_idle_hours: 1,
        },
        backend: BackendSettings {
            base_url: backend_url,
            request_timeout_secs: 5,
        },
        auth: AuthSettings {
            base_url: auth_url,
            refresh_per_request: false,
        },
        smtp: SmtpSettings {
            enabled: false,
            host: "localhost".to_string(),
            port: 2525,
            user: String::new(),
            password: Secret::new(String::new()),
            from_email: "billing@example.com".to_string(),
            from_name: "Billing Desk".to_string(),
        },
        documents: DocumentSettings {
            company_name: "Example Traders".to_string(),
            company_address: "Kochi".to_string(),
            company_gstin: Some("32AAECW1234B1Z0".to_string()),
            payment_terms_days: 30,
            generation_timeout_secs: 10,
            email_timeout_secs: 10,
        },
        telemetry: TelemetrySettings::default(),
    }
}

/// An unsigned ID token carrying the given role and department claims.
pub fn id_token(user_id: &str, role: &str, department: &str) -> String {
    let claims = json!({
        "sub": user_id,
        "email": format!("{}@example.com", user_id),
        "custom:role": role,
        "custom:department": department,
    });
    format!(
        "eyJhbGciOiJSUzI1NiJ9.{}.signature",
        general_purpose::URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

pub fn credit_bill(id: &str, invoice: &str, total: u64, balance: u64) -> Value {
    json!({
        "_id": id,
        "invoiceNumber": invoice,
        "customerId": "c-1",
        "customerName": "Kerala Spices",
        "date": "2026-01-10",
        "grandTotal": total,
        "amountPaid": total - balance,
        "balanceAmount": balance,
    })
}

impl TestApp {
    pub async fn spawn() -> Self {
        let backend = MockServer::start().await;
        let auth = MockServer::start().await;
        let mailer = Arc::new(MockMailer::new());

        let app = Application::build_with_mailer(
            settings(backend.uri(), auth.uri()),
            mailer.clone() as Arc<dyn Mailer>,
        )
        .await
        .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to build HTTP client");

        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            backend,
            auth,
            mailer,
            client,
        }
    }

    /// Sign in with the given role and department through the login form.
    pub async fn login_as(&self, role: &str, department: &str) {
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "idToken": id_token("u-7", role, department),
                "refreshToken": "refresh-token",
            })))
            .mount(&self.auth)
            .await;

        let response = self
            .post_form("/login", &[("email", "u-7@example.com"), ("password", "secret")])
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["HX-Redirect"], "/dashboard");
    }

    pub async fn get(&self, route: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, route))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_form(&self, route: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, route))
            .header("HX-Request", "true")
            .form(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Serve `bill` and an empty debit note list for it.
    pub async fn mount_bill(&self, bill: Value) {
        let id = bill["_id"].as_str().unwrap_or_default().to_string();
        Mock::given(method("GET"))
            .and(path(format!("/api/creditbills/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(bill))
            .mount(&self.backend)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/debitnotes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&self.backend)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/customers/c-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_id": "c-1",
                "name": "Kerala Spices",
                "gstin": "32AAECW1234B1Z0",
                "address": "Market Road, Kochi",
            })))
            .mount(&self.backend)
            .await;
    }

    /// Open a draft against `credit_bill_id`; the bill must be mounted.
    pub async fn open_draft(&self, credit_bill_id: &str) {
        let response = self
            .post_form("/debit-notes/draft", &[("credit_bill_id", credit_bill_id)])
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["HX-Redirect"], "/debit-notes/draft");
    }

    pub async fn add_installment(&self, amount: &str) -> reqwest::Response {
        self.post_form(
            "/debit-notes/draft/installments",
            &[("amount", amount), ("date", "2026-02-01")],
        )
        .await
    }
}
