#![forbid(unsafe_code)]

use log::info;
use poem_openapi::{ OpenApi, payload::PlainText };

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
// One handler serves both trigger methods.  The service name baked into the
// greeting comes from the configuration instead of being hardcoded per copy
// of the function.
pub struct GreetingApi {
    service_name: String,
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl GreetingApi {
    #[oai(path = "/PIKAFunction", method = "get")]
    async fn get_greeting(&self) -> PlainText<String> {
        self.process()
    }

    // The request body, if any, is never read.
    #[oai(path = "/PIKAFunction", method = "post")]
    async fn post_greeting(&self) -> PlainText<String> {
        self.process()
    }
}

// ***************************************************************************
//                          Request/Response Methods
// ***************************************************************************
impl GreetingApi {
    pub fn new(service_name: &str) -> Self {
        Self { service_name: service_name.to_string() }
    }

    /// Process the request.  Nothing about the request is inspected, so the
    /// response is the same for every invocation.
    fn process(&self) -> PlainText<String> {
        info!("PIKAFunction processed a request.");
        PlainText(format!("Welcome to {} Azure Function!", self.service_name))
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use poem::{test::TestClient, Route};
    use poem_openapi::OpenApiService;

    use super::GreetingApi;

    const GREETING: &str = "Welcome to PIKAService Azure Function!";

    fn test_app() -> Route {
        let service =
            OpenApiService::new(GreetingApi::new("PIKAService"), "Pika Service", "0.1.0");
        Route::new().nest("/api", service)
    }

    #[tokio::test]
    async fn get_returns_fixed_greeting() {
        let cli = TestClient::new(test_app());
        let resp = cli.get("/api/PIKAFunction").send().await;
        resp.assert_status_is_ok();
        resp.assert_header("content-type", "text/plain; charset=utf-8");
        resp.assert_text(GREETING).await;
    }

    #[tokio::test]
    async fn post_ignores_json_payload() {
        let cli = TestClient::new(test_app());
        let resp = cli.post("/api/PIKAFunction")
            .content_type("application/json")
            .body(r#"{"mode": "structured", "task_type": "health"}"#)
            .send()
            .await;
        resp.assert_status_is_ok();
        resp.assert_text(GREETING).await;
    }

    #[tokio::test]
    async fn query_string_is_ignored() {
        let cli = TestClient::new(test_app());
        let resp = cli.get("/api/PIKAFunction?name=somebody&x=1").send().await;
        resp.assert_status_is_ok();
        resp.assert_text(GREETING).await;
    }

    #[tokio::test]
    async fn repeated_requests_are_identical() {
        let cli = TestClient::new(test_app());
        for _ in 0..3 {
            let resp = cli.get("/api/PIKAFunction").send().await;
            resp.assert_status_is_ok();
            resp.assert_text(GREETING).await;
        }
    }

    #[tokio::test]
    async fn service_name_comes_from_configuration() {
        let service =
            OpenApiService::new(GreetingApi::new("AltService"), "Pika Service", "0.1.0");
        let cli = TestClient::new(Route::new().nest("/api", service));
        let resp = cli.get("/api/PIKAFunction").send().await;
        resp.assert_status_is_ok();
        resp.assert_text("Welcome to AltService Azure Function!").await;
    }
}
