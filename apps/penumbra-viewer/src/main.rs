//! Penumbra Demo Viewer
//!
//! Orbits a camera around a test scene, runs the virtual shadow map every
//! frame and writes shaded, shadow mask and debug images for selected frames.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p penumbra-viewer -- [OPTIONS]
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;

use tracing_subscriber::EnvFilter;
#[cfg(feature = "profiling-tracy")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::{Viewer, ViewerParams};

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    init_logging();

    let params = ViewerParams::parse_args(&args)?;
    Viewer::new(params)?.run()
}

fn init_logging() {
    #[cfg(feature = "profiling-tracy")]
    {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,penumbra_vsm=trace,penumbra_render=trace,penumbra_viewer=trace")
        });
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .with(tracing_tracy::TracyLayer::default())
            .init();
    }
    #[cfg(not(feature = "profiling-tracy"))]
    {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }
}

fn print_help() {
    eprintln!(
        "Penumbra Demo Viewer

USAGE:
    cargo run -p penumbra-viewer -- [OPTIONS]

RUN OPTIONS:
    -n, --count <N>         Number of frames to run (default: 120)
    -f, --frames <FRAMES>   Frame indices to capture
                            Examples: \"0\" \"0,10,20\" \"0-5\" \"0,5-10,20\"
                            Default: last frame
    -o, --output <DIR>      Output directory (default: captures)
    --width <N>             Image width (default: 640)
    --height <N>            Image height (default: 360)
    --mask                  Also write the shadow mask
    --debug <MODE>          Also write a debug view: occupancy, pool, cascade

SHADOW MAP OPTIONS:
    --pool <N>              Physical pages per axis (default: 32)
    --cascades <N>          Number of cascades (default: 8)
    --light <X,Y,Z>         Direction towards the light (default: 1,1,1)
    --evict-least-recent    Evict idle pages early when the pool runs out

OTHER:
    -h, --help              Print this help message

EXAMPLES:
    # Orbit for 120 frames, write the last one
    cargo run -p penumbra-viewer

    # Capture frames during the orbit with the page occupancy view
    cargo run -p penumbra-viewer -- -f 0,30,60 --mask --debug occupancy

    # Starve the pool to see eviction at work
    cargo run -p penumbra-viewer -- --pool 6 --evict-least-recent --debug occupancy

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}
