//! Enzyme Kinetics Example
//!
//! Runs a hybrid net mixing stochastic arrivals, Michaelis-Menten flow and
//! timed packing, then prints the trajectory of every place.
//!
//! ```bash
//! RUST_LOG=petriflow_engine=debug cargo run -p enzyme_kinetics -- [net.ron|net.json] [horizon] [dt]
//! ```

use petriflow_core::{Net, NetView, PlaceId};
use petriflow_engine::RunState;
use petriflow_script::NetDocument;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_NET: &str = include_str!("../net.ron");

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

/// Parse an optional positive number argument, keeping `default` when absent
fn positive_arg(arg: Option<String>, name: &str, default: f64) -> Result<f64, String> {
    let Some(arg) = arg else {
        return Ok(default);
    };
    match arg.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
        _ => Err(format!("{} must be a positive number, got {:?}", name, arg)),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let document = match args.next() {
        Some(path) => NetDocument::load(path)?,
        None => NetDocument::from_ron_str(DEFAULT_NET)?,
    };
    let horizon = positive_arg(args.next(), "horizon", 30.0)?;
    let dt = positive_arg(args.next(), "dt", 0.1)?;
    tracing::info!(name = %document.name, horizon, dt, "running net");

    println!("=== Petriflow: {} ===\n", document.name);
    let mut controller = document.into_controller()?;
    let places: Vec<PlaceId> = controller.net().places().map(|p| p.id.clone()).collect();

    print_header(&places);
    print_row(controller.get_time(), controller.net(), &places);

    let mut t = 0.0;
    while t < horizon {
        t = (t + 1.0).min(horizon);
        controller.run_until(t, dt)?;
        print_row(controller.get_time(), controller.net(), &places);
        if controller.enabled_transitions().is_empty() {
            println!("\nNo transition enabled, stopping at t={:.2}", controller.get_time());
            break;
        }
    }

    println!("\nFirings:");
    for transition in controller.net().transitions() {
        println!(
            "  {:<8} {:>5}",
            transition.id.as_str(),
            controller.fired_count(&transition.id)
        );
    }

    if !controller.diagnostics().is_empty() {
        println!("\nDiagnostics:");
        for diagnostic in controller.diagnostics() {
            println!("  {}", diagnostic);
        }
    }

    let samples: usize = places
        .iter()
        .map(|p| controller.get_token_trace(p).len())
        .sum();
    println!("\n{} trace samples recorded across {} places", samples, places.len());

    if let RunState::Halted { reason } = controller.state() {
        tracing::warn!(%reason, "run halted");
    }
    tracing::info!(
        time = controller.get_time(),
        samples,
        diagnostics = controller.diagnostics().len(),
        "run finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_arg() {
        assert_eq!(positive_arg(None, "dt", 0.1), Ok(0.1));
        assert_eq!(positive_arg(Some("2.5".to_string()), "dt", 0.1), Ok(2.5));

        let err = positive_arg(Some("fast".to_string()), "horizon", 30.0).unwrap_err();
        assert_eq!(err, "horizon must be a positive number, got \"fast\"");
        assert!(positive_arg(Some("0".to_string()), "dt", 0.1).is_err());
        assert!(positive_arg(Some("-1".to_string()), "dt", 0.1).is_err());
        assert!(positive_arg(Some("NaN".to_string()), "dt", 0.1).is_err());
    }

    #[test]
    fn test_bundled_net_loads() {
        let controller = NetDocument::from_ron_str(DEFAULT_NET)
            .unwrap()
            .into_controller()
            .unwrap();
        assert_eq!(controller.state(), &RunState::Idle);
    }
}

fn print_header(places: &[PlaceId]) {
    print!("{:>8}", "time");
    for place in places {
        print!(" {:>10}", place.as_str());
    }
    println!();
}

fn print_row(time: f64, net: &Net, places: &[PlaceId]) {
    print!("{:>8.2}", time);
    for place in places {
        let tokens = net.place_tokens(place).unwrap_or(0.0);
        print!(" {:>10.3}", tokens);
    }
    println!();
}
