#![forbid(unsafe_code)]

use poem::Request;
use poem_openapi::{ OpenApi, payload::Json, Object, ApiResponse };
use anyhow::Result;
use log::{error, info};

use crate::utils::errors::HttpResult;
use crate::utils::pika_utils::{self, RequestDebug};

// Both operands are required, as in every arithmetic function.
const MISSING_OPERANDS_MSG: &str = "Parameters 'a' and 'b' must both be provided.";

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct MultiplyNumbersApi;

#[derive(Object)]
pub struct ReqMultiplyNumbers
{
    a: Option<f64>,
    b: Option<f64>,
}

#[derive(Object, Debug)]
pub struct RespMultiplyNumbers
{
    result_code: String,
    result_msg: String,
    result: f64,
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqMultiplyNumbers {
    type Req = ReqMultiplyNumbers;
    fn get_request_info(&self) -> String {
        let mut s = String::with_capacity(255);
        s.push_str("  Request body:");
        s.push_str("\n    a: ");
        s.push_str(&format!("{:?}", self.a));
        s.push_str("\n    b: ");
        s.push_str(&format!("{:?}", self.b));
        s
    }
}

// ------------------- HTTP Status Codes -------------------
#[derive(Debug, ApiResponse)]
enum PikaResponse {
    #[oai(status = 200)]
    Http200(Json<RespMultiplyNumbers>),
    #[oai(status = 400)]
    Http400(Json<HttpResult>),
    #[oai(status = 500)]
    Http500(Json<HttpResult>),
}

fn make_http_200(resp: RespMultiplyNumbers) -> PikaResponse {
    PikaResponse::Http200(Json(resp))
}
fn make_http_400(msg: String) -> PikaResponse {
    PikaResponse::Http400(Json(HttpResult::new(400.to_string(), msg)))
}
fn make_http_500(msg: String) -> PikaResponse {
    PikaResponse::Http500(Json(HttpResult::new(500.to_string(), msg)))
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl MultiplyNumbersApi {
    #[oai(path = "/MultiplyNumbers", method = "post")]
    async fn multiply_numbers(&self, http_req: &Request, req: Json<ReqMultiplyNumbers>) -> PikaResponse {
        info!("MultiplyNumbers processed a request.");
        match RespMultiplyNumbers::process(http_req, &req) {
            Ok(r) => r,
            Err(e) => {
                // Assume a server fault if a raw error came through.
                let msg = "ERROR: ".to_owned() + e.to_string().as_str();
                error!("{}", msg);
                make_http_500(msg)
            }
        }
    }
}

// ***************************************************************************
//                          Request/Response Methods
// ***************************************************************************
impl RespMultiplyNumbers {
    /// Create a new response.
    fn new(result_code: &str, result_msg: &str, result: f64) -> Self {
        Self {result_code: result_code.to_string(),
              result_msg: result_msg.to_string(),
              result,
        }
    }

    /// Process the request.
    fn process(http_req: &Request, req: &ReqMultiplyNumbers) -> Result<PikaResponse, anyhow::Error> {
        // Conditional logging depending on log level.
        pika_utils::debug_request(http_req, req);

        // -------------------- Validate Operands ----------------------
        let (a, b) = match (req.a, req.b) {
            (Some(a), Some(b)) => (a, b),
            _ => return Ok(make_http_400(MISSING_OPERANDS_MSG.to_string())),
        };

        Ok(make_http_200(Self::new("0", "success", a * b)))
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use poem::{http::StatusCode, test::TestClient, Route};
    use poem_openapi::OpenApiService;
    use serde_json::json;

    use super::MultiplyNumbersApi;

    fn test_app() -> Route {
        let service = OpenApiService::new(MultiplyNumbersApi, "Pika Service", "0.1.0");
        Route::new().nest("/api", service)
    }

    #[tokio::test]
    async fn multiplies_two_numbers() {
        let cli = TestClient::new(test_app());
        let resp = cli.post("/api/MultiplyNumbers")
            .content_type("application/json")
            .body(r#"{"a": -4, "b": 2.5}"#)
            .send()
            .await;
        resp.assert_status_is_ok();
        resp.assert_json(json!({
            "result_code": "0",
            "result_msg": "success",
            "result": -10.0
        })).await;
    }

    #[tokio::test]
    async fn missing_operands_are_rejected() {
        let cli = TestClient::new(test_app());
        let resp = cli.post("/api/MultiplyNumbers")
            .content_type("application/json")
            .body("{}")
            .send()
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        resp.assert_json(json!({
            "result_code": "400",
            "result_msg": "Parameters 'a' and 'b' must both be provided."
        })).await;
    }
}
