//! bgcompose command-line tool
//!
//! Tone-adjusts an image and removes or replaces its background using the
//! bgcompose library.

#[cfg(feature = "cli")]
use bgcompose::cli;

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    cli::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("bgcompose was built without the `cli` feature; rebuild with --features cli");
    std::process::exit(1);
}
