use anyhow::Result;
use epcjoin::{clean, link, lookup::PostcodeLookup, regions, table, unify};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

const SCOTLAND_EPC: &str = "scotland_epc.csv";
const ENGLAND_EPC: &str = "manchester_epc.csv";
const POSTCODE_LOOKUP: &str = "pcd_to_lsoa.csv";
const OUTPUT: &str = "joined_epc_data.csv";

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    // ─── 2) reference data ───────────────────────────────────────────
    let lookup = PostcodeLookup::from_csv(POSTCODE_LOOKUP)?;

    // ─── 3) regional datasets: load, link, clean ─────────────────────
    let scotland = regions::load_scotland(SCOTLAND_EPC)?;
    let scotland = link::link_to_areas(
        "scotland",
        &scotland,
        &lookup,
        &[regions::POSTCODE, regions::DATA_ZONE],
    )?;
    let scotland = clean::clean_categoricals(&scotland)?;

    let england = regions::load_england(ENGLAND_EPC)?;
    let england = link::link_to_areas("manchester", &england, &lookup, &[regions::POSTCODE])?;
    let england = clean::clean_categoricals(&england)?;

    // ─── 4) unify + write ────────────────────────────────────────────
    let joined = unify::unify(&scotland, &england)?;
    table::write_csv(&joined, OUTPUT)?;
    info!(
        rows = joined.num_rows(),
        path = OUTPUT,
        "wrote unified EPC dataset"
    );

    Ok(())
}
