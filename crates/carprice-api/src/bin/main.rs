//! Vehicle price predictor CLI
//!
//! # Usage
//!
//! ```bash
//! carprice serve --port 8080 --model models/vehicle_price_model.json
//! carprice predict --input car.json --format json
//! carprice features
//! carprice inspect --model models/vehicle_price_model.json
//! carprice evaluate --data cars.csv
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Prediction input rejected
//! - 3: Invalid input, arguments or configuration
//! - 4: File not found or inaccessible
//! - 5: Model artifact invalid
//! - 10: Internal error

use carprice_api::{run_cli, Cli};
use clap::Parser;

fn main() {
    let cli = Cli::parse();
    let exit_code = run_cli(cli);
    std::process::exit(exit_code.into());
}
