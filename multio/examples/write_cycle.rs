//! Runs one output step through a session: domain, mask, a few fields, flush.
//!
//! ```sh
//! RUST_LOG=multio=trace cargo run --example write_cycle
//! ```

use std::error::Error;

use multio::{Fields, Multio};
use serde_json::json;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut mio = Multio::from_value(Some(&json!({
        "allow_world_default_comm": true,
    })))?;
    println!("multio {} ({})", mio.version()?, mio.vcs_version()?);

    mio.open_connections()?;

    let points = 128;
    let domain: Vec<i32> = (0..points).collect();
    mio.create_metadata(Some(
        Fields::new()
            .with("name", "grid-T")
            .with("category", "ocean-domain-map")
            .with("representation", "structured"),
    ))?;
    mio.write_domain(&domain)?;

    let mask = vec![1.0f64; points as usize];
    mio.create_metadata(Some(
        Fields::new()
            .with("name", "grid-T")
            .with("category", "ocean-mask"),
    ))?;
    mio.write_mask(&mask)?;

    for level in [1, 10, 100] {
        let fields = Fields::from_value(&json!({
            "name": "sst",
            "category": "ocean-3d",
            "domain": "grid-T",
            "level": level,
            "step": 6,
        }))?;
        mio.create_metadata(Some(fields))?;
        if !mio.field_accepted(true)? {
            continue;
        }
        let values: Vec<f32> = (0..points).map(|i| 273.15 + i as f32 / level as f32).collect();
        mio.write_field(&values)?;
    }

    mio.notify()?;
    mio.flush()?;
    mio.close_connections()?;
    Ok(())
}
