#![forbid(unsafe_code)]

use anyhow::{Result, anyhow};
use log::{info, error, LevelFilter};
use serde::Deserialize;
use std::{env, fs, path::Path};
use toml;
use fs_mistrust::Mistrust;
use std::os::unix::fs::PermissionsExt;
use lazy_static::lazy_static;
use structopt::StructOpt;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Root};
use log4rs::encode::pattern::PatternEncoder;

// Pika Utilities
use crate::utils::{pika_utils, errors::Errors};

use super::pika_utils::get_absolute_path;

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Directory and file locations. Unless otherwise noted, all files and directories
// are relative to the root directory.
const ENV_PIKA_ROOT_DIR    : &str = "PIKA_ROOT_DIR";
const DEFAULT_ROOT_DIR     : &str = "~/.pika";
const CONFIG_DIR           : &str = "/config";
const LOGS_DIR             : &str = "/logs";
const LOG4RS_CONFIG_FILE   : &str = "/log4rs.yml"; // relative to config dir
const PIKA_CONFIG_FILE     : &str = "/pika.toml";  // relative to config dir

// Networking.
const DEFAULT_HTTP_ADDR    : &str = "http://localhost";
const DEFAULT_HTTP_PORT    : u16  = 8080;

// The hosting runtime tells custom handlers which local port to bind.
const ENV_CUSTOMHANDLER_PORT : &str = "FUNCTIONS_CUSTOMHANDLER_PORT";

// The name inserted into the greeting when no configuration overrides it.
pub const DEFAULT_SERVICE_NAME : &str = "PIKAService";

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Assign the command line arguments BEFORE RUNTIME_CTX is initialized in main.
lazy_static! {
    pub static ref PIKA_ARGS: PikaArgs = init_pika_args();
}

// Calculate the data directories BEFORE RUNTIME_CTX is initialized in main.
lazy_static! {
    pub static ref PIKA_DIRS: PikaDirs = init_pika_dirs();
}

// ***************************************************************************
//                             Directory Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// PikaDirs:
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct PikaDirs {
    pub root_dir: String,
    pub config_dir: String,
    pub logs_dir: String,
}

// ***************************************************************************
//                               Config Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// CommandLineArgs:
// ---------------------------------------------------------------------------
#[derive(Debug, StructOpt)]
#[structopt(name = "pika_args", about = "Command line arguments for the Pika server.")]
pub struct PikaArgs {
    /// Specify the server's root data directory.
    ///
    /// This directory contains all the files pika_server uses during execution.
    #[structopt(short, long)]
    pub root_dir: Option<String>,

    /// Create the data directories and then exit.
    ///
    /// The data directories will be rooted at a root directory calculated
    /// using the following priority order:
    ///
    ///   1. If set, the value of the PIKA_ROOT_DIR environment,
    ///
    ///   2. Otherwise, if set, the value of the --root_dir command line argument,
    ///
    ///   3. Otherwise, ~/.pika
    ///
    #[structopt(short, long)]
    pub create_dirs_only: bool,
}

// ---------------------------------------------------------------------------
// Parms:
// ---------------------------------------------------------------------------
#[derive(Debug)]
#[allow(dead_code)]
pub struct Parms {
    pub config_file: String,
    pub config: Config,
}

// ---------------------------------------------------------------------------
// RuntimeCtx:
// ---------------------------------------------------------------------------
#[derive(Debug)]
#[allow(dead_code)]
pub struct RuntimeCtx {
    pub parms: Parms,
    pub pika_args: &'static PikaArgs,
    pub pika_dirs: &'static PikaDirs,
}

// ---------------------------------------------------------------------------
// Config:
// ---------------------------------------------------------------------------
// Installations may provide any subset of the keys; the rest default.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub title: String,
    pub http_addr: String,
    pub http_port: u16,
    pub service_name: String,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "Pika Service".to_string(),
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

// ***************************************************************************
//                            Directory Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_pika_args:
// ---------------------------------------------------------------------------
/** Get the command line arguments. */
fn init_pika_args() -> PikaArgs {
    let args = PikaArgs::from_args();
    println!("{:?}", args);
    args
}

// ---------------------------------------------------------------------------
// init_pika_dirs:
// ---------------------------------------------------------------------------
/** Calculate the external data directories. */
fn init_pika_dirs() -> PikaDirs {
    // Initialize the mistrust object.
    let mistrust = get_mistrust();

    // Check that each path is absolute and is a directory with the
    // proper permission assign if it exists.  If it doesn't exist,
    // create it.
    let root_dir = get_root_dir();
    check_pika_dir(&root_dir, "root directory", &mistrust);

    let config_dir = root_dir.clone() + CONFIG_DIR;
    check_pika_dir(&config_dir, "config directory", &mistrust);

    let logs_dir = root_dir.clone() + LOGS_DIR;
    check_pika_dir(&logs_dir, "logs directory", &mistrust);

    // Package up and return the directories.
    PikaDirs {
        root_dir, config_dir, logs_dir,
    }
}

// ---------------------------------------------------------------------------
// check_pika_dir:
// ---------------------------------------------------------------------------
/** Check that the path is absolute and, if it exists, that is has the proper
 * permissions assigned.  If it doesn't exist, create it.  The mistrust package
 * creates directories with 0o700 permissions.
 *
 * Any failure results in a panic.
 */
fn check_pika_dir(dir: &String, msgname: &str, mistrust: &Mistrust ) {
    // Get the path object.
    let path = Path::new(dir);
    if !path.is_absolute() {
        panic!("The Pika {} path must be absolute: {}", msgname, dir);
    }
    if path.exists() {
        // Make sure the path represents a directory.
        if !path.is_dir() {
            panic!("The Pika {} path must be a directory: {}", msgname, dir);
        }

        // Make sure the directory had rwx for owner only.
        let meta = path.metadata().unwrap_or_else(|_| panic!("Unable to read metadata for {}: {}", msgname, dir));
        let perm = meta.permissions().mode();
        if perm & 0o777 != 0o700 {
            panic!("The Pika {} path must be have 0o700 permissions: {}", msgname, dir);
        }
    } else {
        // Create the directory with the correct permissions.
        match mistrust.make_directory(path) {
            Ok(_) => (),
            Err(e) => {
                panic!("Make directory error for {:?}: {}", path, &e.to_string());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// get_mistrust:
// ---------------------------------------------------------------------------
/** Configure a new mistrust object for initial directory processing. */
fn get_mistrust() -> Mistrust {
    // Configure our mistrust object.
    let mistrust = match Mistrust::builder()
        .ignore_prefix(get_absolute_path("~"))
        .trust_group(0)
        .build() {
            Ok(m) => m,
            Err(e) => {
                panic!("Mistrust configuration error: {}", &e.to_string());
            }
        };
    mistrust
}

// ---------------------------------------------------------------------------
// get_root_dir:
// ---------------------------------------------------------------------------
fn get_root_dir() -> String {
    // Order of precedence:
    //  1. Environment variable
    //  2. Command line --root-dir argument
    //  3. Default location
    //
    let root_dir = env::var(ENV_PIKA_ROOT_DIR).unwrap_or_else(
        |_| {
            match PIKA_ARGS.root_dir.clone() {
                Some(r) => r,
                None => DEFAULT_ROOT_DIR.to_string(),
            }
        });

    // Canonicalize the path.
    get_absolute_path(&root_dir)
}

// ***************************************************************************
//                               Log Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_log:
// ---------------------------------------------------------------------------
pub fn init_log() {
    // Use the installation's log4rs file when one exists.
    let logconfig = init_log_config();
    if Path::new(&logconfig).is_file() {
        match log4rs::init_file(logconfig.clone(), Default::default()) {
            Ok(_) => (),
            Err(e) => {
                println!("{}", e);
                let s = format!("{}", Errors::Log4rsInitialization(logconfig));
                panic!("{}", s);
            },
        }
        info!("Log4rs initialized using: {}", logconfig);
        return;
    }

    // Otherwise log to the console at info level.  The log4rs file is
    // optional, unlike the rest of the data directory skeleton.
    match log4rs::init_config(default_log_config()) {
        Ok(_) => (),
        Err(e) => {
            println!("{}", e);
            let s = format!("{}", Errors::Log4rsInitialization(logconfig));
            panic!("{}", s);
        },
    }
    info!("Log4rs initialized using the default console configuration.");
}

// ---------------------------------------------------------------------------
// init_log_config:
// ---------------------------------------------------------------------------
fn init_log_config() -> String {
    PIKA_DIRS.config_dir.clone() + LOG4RS_CONFIG_FILE
}

// ---------------------------------------------------------------------------
// default_log_config:
// ---------------------------------------------------------------------------
/** Build a console-only configuration for installations that don't provide
 * a log4rs.yml file.
 */
fn default_log_config() -> log4rs::Config {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S)} {l} {t} - {m}{n}")))
        .build();
    match log4rs::Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info)) {
            Ok(c) => c,
            Err(e) => {
                panic!("Default log configuration error: {}", &e.to_string());
            }
        }
}

/// ***************************************************************************
//                             Parms Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// get_parms:
// ---------------------------------------------------------------------------
/** Retrieve the application parameters from the configuration file in the
 * config data directory.  A missing file just means default values; a file
 * that exists but doesn't parse aborts start up.
 */
fn get_parms() -> Result<Parms> {
    // Get the config file path from its data directory.
    let config_file = PIKA_DIRS.config_dir.clone() + PIKA_CONFIG_FILE;

    // Read the configuration file.
    let config_file_abs = pika_utils::get_absolute_path(&config_file);
    info!("{}", Errors::ReadingConfigFile(config_file_abs.clone()));
    let contents = match fs::read_to_string(&config_file_abs) {
        Ok(c) => c,
        Err(_) => {
            println!("Unable to read configuration at {}. Using default values.", config_file);
            let mut config = Config::new();
            config.http_port = resolve_http_port(config.http_port);
            return Ok(Parms { config_file: Default::default(), config });
        }
    };

    // Parse the toml configuration.
    let mut config : Config = match toml::from_str(&contents) {
        Ok(c)  => c,
        Err(e) => {
            let msg = format!("{}\n   {}", Errors::TOMLParseError(config_file_abs), e);
            error!("{}", msg);
            return Result::Err(anyhow!(msg));
        }
    };

    // The hosting runtime dictates the listen port when it sets the
    // custom handler environment variable.
    config.http_port = resolve_http_port(config.http_port);

    Ok(Parms { config_file: config_file_abs, config })
}

// ---------------------------------------------------------------------------
// resolve_http_port:
// ---------------------------------------------------------------------------
fn resolve_http_port(config_port: u16) -> u16 {
    match env::var(ENV_CUSTOMHANDLER_PORT) {
        Ok(s) => parse_custom_handler_port(&s),
        Err(_) => config_port,
    }
}

// ---------------------------------------------------------------------------
// parse_custom_handler_port:
// ---------------------------------------------------------------------------
/** A custom handler port that doesn't parse means the hosting runtime and
 * this server disagree about the contract, so abort start up.
 */
fn parse_custom_handler_port(value: &str) -> u16 {
    match value.trim().parse::<u16>() {
        Ok(p) => p,
        Err(_) => {
            panic!("Invalid {} value: {}", ENV_CUSTOMHANDLER_PORT, value);
        }
    }
}

// ***************************************************************************
//                             Config Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_runtime_context:
// ---------------------------------------------------------------------------
pub fn init_runtime_context() -> RuntimeCtx {
    // If this fails the application aborts.
    let parms = get_parms().expect("FAILED to read configuration file.");
    RuntimeCtx {parms, pika_args: &PIKA_ARGS, pika_dirs: &PIKA_DIRS}
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use crate::utils::config::{parse_custom_handler_port, Config, DEFAULT_SERVICE_NAME};

    #[test]
    fn print_config() {
        println!("{:?}", Config::new());
    }

    #[test]
    fn default_config_values() {
        let config = Config::new();
        assert_eq!(config.title, "Pika Service");
        assert_eq!(config.http_addr, "http://localhost");
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.service_name, DEFAULT_SERVICE_NAME);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str("service_name = \"AltService\"")
            .expect("partial config should parse");
        assert_eq!(config.service_name, "AltService");
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.http_addr, "http://localhost");
    }

    #[test]
    fn full_toml_parses() {
        let text = "title = \"My Functions\"\n\
                    http_addr = \"http://127.0.0.1\"\n\
                    http_port = 7071\n\
                    service_name = \"PIKAService\"\n";
        let config: Config = toml::from_str(text).expect("full config should parse");
        assert_eq!(config.title, "My Functions");
        assert_eq!(config.http_port, 7071);
    }

    #[test]
    fn custom_handler_port_parses_digits() {
        assert_eq!(parse_custom_handler_port("7071"), 7071);
        assert_eq!(parse_custom_handler_port(" 8080 "), 8080);
    }

    #[test]
    #[should_panic(expected = "Invalid FUNCTIONS_CUSTOMHANDLER_PORT")]
    fn custom_handler_port_rejects_garbage() {
        parse_custom_handler_port("not-a-port");
    }
}
