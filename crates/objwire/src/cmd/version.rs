use objwire_crypto::FORMAT_VERSION;
use objwire_frame::{DEFAULT_MAX_PAYLOAD, MAGIC};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("objwire {VERSION}");
    if args.extended {
        for (key, value) in provenance() {
            println!("{key:>14}: {value}");
        }
    }
    Ok(SUCCESS)
}

/// Build facts plus the wire constants a peer must agree on.
fn provenance() -> Vec<(&'static str, String)> {
    vec![
        (
            "target",
            option_env!("OBJWIRE_BUILD_TARGET")
                .unwrap_or("unknown")
                .to_string(),
        ),
        ("git_hash", option_env!("GIT_HASH").unwrap_or("unknown").to_string()),
        ("frame_magic", String::from_utf8_lossy(&MAGIC).into_owned()),
        ("max_payload", format!("{DEFAULT_MAX_PAYLOAD} bytes")),
        ("cipher", format!("xchacha20poly1305 v{FORMAT_VERSION}")),
    ]
}
