use std::sync::Arc;

use btleplug::api::BDAddr;
use log::info;

use blecycle::{
    init_logger, Advertiser, BleHost, HarnessConfig, RadioSim, Scanner, SimHost, TestList,
};

const SCANNER_ADDR: [u8; 6] = [0xc0, 0x00, 0x00, 0x00, 0x00, 0x01];
const ADVERTISER_ADDR: [u8; 6] = [0xc0, 0x00, 0x00, 0x00, 0x00, 0x02];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    // Get command line args to determine which roles to run
    let args: Vec<String> = std::env::args().collect();
    let role = args.get(1).map(String::as_str).unwrap_or("both");
    let config = match args.get(2) {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };

    let radio = Arc::new(RadioSim::new());
    let mut tests = TestList::new();

    match role {
        "scanner" => tests.register(
            Scanner::new(scanner_host(&radio, &config), config.clone()).into_test(),
        ),
        "advertiser" => tests.register(
            Advertiser::new(advertiser_host(&radio, &config), config.clone()).into_test(),
        ),
        "both" => {
            tests.register(
                Scanner::new(scanner_host(&radio, &config), config.clone()).into_test(),
            );
            tests.register(
                Advertiser::new(advertiser_host(&radio, &config), config.clone()).into_test(),
            );
        }
        _ => {
            print_usage();
            std::process::exit(2);
        }
    }

    if role == "scanner" {
        info!("scanner running without a peer; it will fail unless something advertises");
    }

    let reports = tests.run_all(&config).await;
    let mut all_passed = true;
    for report in &reports {
        println!("{}", serde_json::to_string(report)?);
        all_passed &= report.passed();
    }

    if !all_passed {
        std::process::exit(1);
    }
    Ok(())
}

fn scanner_host(radio: &Arc<RadioSim>, config: &HarnessConfig) -> Arc<dyn BleHost> {
    Arc::new(SimHost::new(
        Arc::clone(radio),
        BDAddr::from(SCANNER_ADDR),
        format!("{}-scanner", config.device_name),
    ))
}

fn advertiser_host(radio: &Arc<RadioSim>, config: &HarnessConfig) -> Arc<dyn BleHost> {
    Arc::new(SimHost::new(
        Arc::clone(radio),
        BDAddr::from(ADVERTISER_ADDR),
        format!("{}-advertiser", config.device_name),
    ))
}

fn print_usage() {
    println!("\nUsage:");
    println!("  blecycle [role] [config.json]");
    println!("    role: scanner | advertiser | both (default: both)");
    println!("    config.json: optional harness settings file");
}
