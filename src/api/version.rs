#![forbid(unsafe_code)]

use poem_openapi::{ OpenApi, payload::Json, Object };
use poem::Error;

use crate::utils::pika_utils::{timestamp_utc, timestamp_utc_to_str};

// From cargo.toml.
const PIKA_VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct VersionApi;

#[derive(Object)]
struct RespVersion
{
    result_code: String,
    result_msg: String,
    pika_version: String,
    build_timestamp: String,
    rustc_version: String,
    server_time: String,
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl VersionApi {
    #[oai(path = "/version", method = "get")]
    async fn get_version(&self) -> Json<RespVersion> {
        let resp = match RespVersion::process() {
            Ok(r) => r,
            Err(e) => {
                let msg = "ERROR: ".to_owned() + e.to_string().as_str();
                RespVersion::new("1", msg.as_str(), "", "", "", "")},
        };

        Json(resp)
    }
}

// ***************************************************************************
//                          Request/Response Methods
// ***************************************************************************
impl RespVersion {
    fn new(result_code: &str, result_msg: &str, pika: &str, build_ts: &str, rustc: &str, now: &str)
    -> Self {
        Self {result_code: result_code.to_string(),
              result_msg: result_msg.to_string(),
              pika_version: pika.to_string(),
              build_timestamp: build_ts.to_string(),
              rustc_version: rustc.to_string(),
              server_time: now.to_string(),
        }
    }

    fn process() -> Result<RespVersion, Error> {
        Ok(Self::new("0",
                    "success",
                    PIKA_VERSION.unwrap_or("unknown"),
                    env!("BUILD_TIMESTAMP"),
                    env!("RUSTC_VERSION"),
                    timestamp_utc_to_str(timestamp_utc()).as_str()),
        )
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use poem::{test::TestClient, Route};
    use poem_openapi::OpenApiService;

    use super::{RespVersion, VersionApi};

    #[test]
    fn process_reports_build_info() {
        let resp = RespVersion::process().expect("version processing cannot fail");
        assert_eq!(resp.result_code, "0");
        assert_eq!(resp.pika_version, env!("CARGO_PKG_VERSION"));
        assert!(!resp.rustc_version.is_empty());
        assert!(!resp.server_time.is_empty());
    }

    #[tokio::test]
    async fn endpoint_returns_200() {
        let service = OpenApiService::new(VersionApi, "Pika Service", "0.1.0");
        let cli = TestClient::new(Route::new().nest("/api", service));
        let resp = cli.get("/api/version").send().await;
        resp.assert_status_is_ok();
    }
}
