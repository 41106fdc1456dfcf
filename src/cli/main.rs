use fcc::sotp::FileSotp;
use fcc::storage::FileStorage;
use fcc::time::RtcTimeSource;
use fcc::{BundleResponse, FactoryConfigurator, FccConfig, FccError};

use fcc::reexports::log;

use clap::{Arg, ArgAction, ArgMatches, Command, crate_description, crate_name, crate_version};
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

/// Helper function to create a file with parent directories
fn create_file_with_dirs(path: impl AsRef<Path>) -> Result<File, FccError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            FccError::StorageError(format!(
                "Failed to create parent directory for '{}': {}",
                path.display(),
                e
            ))
        })?;
    }
    File::create(path).map_err(|e| {
        FccError::StorageError(format!("Failed to create file '{}': {}", path.display(), e))
    })
}

/// Helper function to read a whole file with better error messages
fn read_file(path: impl AsRef<Path>) -> Result<Vec<u8>, FccError> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| {
        FccError::StorageError(format!("Failed to open file '{}': {}", path.display(), e))
    })?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    Ok(data)
}

fn store_arg() -> Arg {
    Arg::new("store")
        .value_name("store_dir")
        .long("store")
        .short('s')
        .required(true)
        .help("Directory holding the device's item storage and SOTP slots")
}

fn required_str<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a str, FccError> {
    matches
        .get_one::<String>(id)
        .map(|s| s.as_str())
        .ok_or(FccError::InvalidParameter)
}

/// Open the device emulated under `store_dir`
fn open_device(store_dir: &str) -> Result<FactoryConfigurator, FccError> {
    let store_dir = Path::new(store_dir);
    let sotp = FileSotp::open(store_dir.join("sotp"))?;
    let mut fcc = FactoryConfigurator::new(
        Box::new(FileStorage::new(store_dir.join("items"))),
        Box::new(sotp),
        Box::new(RtcTimeSource::from_system()),
        FccConfig::default(),
    );
    fcc.init()?;
    Ok(fcc)
}

fn print_response(response: &BundleResponse, verbose: bool) {
    println!("Return status: {}", response.return_status);
    println!("Info:          {}", response.error_info);
    if let Some(warnings) = &response.warning_info {
        for warning in warnings.split("; ") {
            println!("Warning:       {}", warning);
        }
    }
    if verbose {
        println!(
            "Scheme:        {}",
            String::from_utf8_lossy(&response.scheme_version)
        );
    }
}

fn start() -> Result<(), FccError> {
    let matches = Command::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Verbose output"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .action(ArgAction::SetTrue)
                .help("Prints debugging information"),
        )
        .subcommand(
            Command::new("apply")
                .about("Apply a provisioning bundle to the device")
                .arg(store_arg())
                .arg(
                    Arg::new("in")
                        .value_name("bundle_file")
                        .long("input-file")
                        .short('i')
                        .required(true)
                        .help("CBOR bundle file"),
                )
                .arg(
                    Arg::new("out")
                        .value_name("response_file")
                        .long("output-file")
                        .short('o')
                        .help("Write the CBOR response to this file"),
                ),
        )
        .subcommand(
            Command::new("verify")
                .about("Verify that the device is fully configured")
                .arg(store_arg()),
        )
        .subcommand(
            Command::new("status")
                .about("Show whether the factory flow is disabled")
                .arg(store_arg()),
        )
        .subcommand(
            Command::new("reset")
                .about("Erase every item that was not provisioned at the factory")
                .arg(store_arg()),
        )
        .subcommand(
            Command::new("show")
                .about("Print a bundle response")
                .arg(
                    Arg::new("in")
                        .value_name("response_file")
                        .long("input-file")
                        .short('i')
                        .required(true)
                        .help("CBOR response file"),
                ),
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");
    let debug = matches.get_flag("debug");

    env_logger::builder()
        .format_timestamp(None)
        .format_level(false)
        .format_module_path(false)
        .format_target(false)
        .filter_level(if debug {
            log::LevelFilter::Debug
        } else if verbose {
            log::LevelFilter::Info
        } else {
            log::LevelFilter::Warn
        })
        .init();

    if let Some(matches) = matches.subcommand_matches("apply") {
        let mut fcc = open_device(required_str(matches, "store")?)?;
        let bundle = read_file(required_str(matches, "in")?)?;
        let (result, response) = fcc.handle_bundle(&bundle);
        let response = response.ok_or(FccError::BundleResponseError)?;
        if let Some(output_file) = matches.get_one::<String>("out") {
            create_file_with_dirs(output_file)?.write_all(&response)?;
            println!("Response saved to [{output_file}]");
        }
        print_response(&BundleResponse::from_cbor(&response)?, verbose);
        fcc.finalize()?;
        result?;
    } else if let Some(matches) = matches.subcommand_matches("verify") {
        let mut fcc = open_device(required_str(matches, "store")?)?;
        let result = fcc.verify_device_configured();
        for (parameter, warning) in fcc.output_info().warnings() {
            println!("Warning: {}: {}", warning, parameter);
        }
        for (parameter, error) in fcc.output_info().errors() {
            println!("Error:   {}: {}", error, parameter);
        }
        fcc.finalize()?;
        result?;
        println!("Device is configured");
    } else if let Some(matches) = matches.subcommand_matches("status") {
        let mut fcc = open_device(required_str(matches, "store")?)?;
        let disabled = fcc.is_factory_disabled()?;
        println!("Factory flow: {}", if disabled { "disabled" } else { "enabled" });
        if verbose {
            println!("Device time:  {}", fcc.now());
        }
        fcc.finalize()?;
    } else if let Some(matches) = matches.subcommand_matches("reset") {
        let mut fcc = open_device(required_str(matches, "store")?)?;
        fcc.storage_delete()?;
        fcc.finalize()?;
        println!("Non-factory items erased");
    } else if let Some(matches) = matches.subcommand_matches("show") {
        let raw = read_file(required_str(matches, "in")?)?;
        if debug {
            let value: serde_cbor::Value = serde_cbor::from_slice(&raw)?;
            println!("{:?}", value);
        }
        print_response(&BundleResponse::from_cbor(&raw)?, verbose);
    } else {
        return Err(FccError::InvalidParameter);
    }
    Ok(())
}

fn main() -> Result<(), FccError> {
    let res = start();
    match res {
        Ok(_) => {}
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
    Ok(())
}
