#![forbid(unsafe_code)]

use lazy_static::lazy_static;
use log::info;
use poem::{listener::TcpListener, Route};
use poem_openapi::OpenApiService;

// Pika endpoints and utilities
use crate::api::add_numbers::AddNumbersApi;
use crate::api::greeting::GreetingApi;
use crate::api::multiply_numbers::MultiplyNumbersApi;
use crate::api::subtract_numbers::SubtractNumbersApi;
use crate::api::version::VersionApi;
use crate::utils::config::{init_log, init_runtime_context, RuntimeCtx};
use crate::utils::errors::Errors;

// Modules
mod api;
mod utils;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const SERVER_NAME : &str = "PikaServer"; // for poem logging

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Lazily initialize the runtime context so that it has a 'static lifetime.
// We exit if we can't read our parameters or set up the data directories.
lazy_static! {
    static ref RUNTIME_CTX: RuntimeCtx = init_runtime_context();
}

// ---------------------------------------------------------------------------
// main:
// ---------------------------------------------------------------------------
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    // --------------- Initialize Pika ----------------
    // Announce ourselves.
    println!("Starting pika_server!");

    // Initialize the server.
    pika_init();

    // Administrative short circuit.
    if RUNTIME_CTX.pika_args.create_dirs_only {
        println!("Data directories created under {}.", RUNTIME_CTX.pika_dirs.root_dir);
        return Ok(());
    }

    // --------------- Main Loop Set Up ---------------
    // Assign base URL.
    let pika_url = format!("{}:{}{}",
        RUNTIME_CTX.parms.config.http_addr,
        RUNTIME_CTX.parms.config.http_port,
        "/api");

    // Create a tuple with all the function endpoints.  The greeter picks up
    // its service name from the configuration.
    let endpoints = (GreetingApi::new(&RUNTIME_CTX.parms.config.service_name),
                     AddNumbersApi, SubtractNumbersApi, MultiplyNumbersApi, VersionApi);
    let api_service =
        OpenApiService::new(endpoints, RUNTIME_CTX.parms.config.title.clone(),
                            env!("CARGO_PKG_VERSION")).server(pika_url);

    // Allow the generated openapi specs to be retrieved from the server.
    let spec = api_service.spec_endpoint();
    let spec_yaml = api_service.spec_endpoint_yaml();

    // Create the routes and run the server.
    let addr = format!("{}{}", "0.0.0.0:", RUNTIME_CTX.parms.config.http_port);
    let ui = api_service.swagger_ui();
    let app = Route::new()
        .nest("/api", api_service)
        .nest("/", ui)
        .at("/spec", spec)
        .at("/spec_yaml", spec_yaml);

    // ------------------ Main Loop -------------------
    // The hosting runtime owns the public listener and terminates TLS; this
    // process only ever sees plaintext HTTP on the configured local port.
    poem::Server::new(TcpListener::bind(addr))
        .name(SERVER_NAME)
        .run(app)
        .await
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// pika_init:
// ---------------------------------------------------------------------------
/** Initialize all subsystems and data structures other than those needed
 * to configure the main loop processor.
 */
fn pika_init() {
    // Configure our log.
    init_log();

    // Force the reading of input parameters and initialization of runtime context.
    info!("{}", Errors::InputParms(format!("{:#?}", *RUNTIME_CTX)));

    // Log build info.
    print_version_info();
}

// ---------------------------------------------------------------------------
// print_version_info:
// ---------------------------------------------------------------------------
fn print_version_info() {
    // Log build info.
    info!("{}.", format!("\n*** Running PIKA={}, BUILD_TS={}, RUSTC={}",
                        option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"),
                        env!("BUILD_TIMESTAMP"),
                        env!("RUSTC_VERSION")),
    );
}
