use std::collections::HashMap;
use std::env;
use std::fmt::Write;
use std::path::PathBuf;

fn main() {
    // (Variable, Type, Default value)
    let mut configs: HashMap<&str, (&str, &str)> = HashMap::from([
        // Empirical oscillator constants; see the tuning module.
        ("MID_CODES_PER_COARSE_TRANSITION", ("u8", "14")),
        ("MID_CODES_BETWEEN_CHANNELS", ("u8", "5")),
        // Channel calibration.
        ("CAL_INITIAL_CHANNEL", ("u8", "17")),
        ("CAL_ALL_CHANNELS", ("bool", "true")),
        ("CAL_MAX_NUM_FAILURES", ("u8", "2")),
        // Coarse range and pinned mid code of the initial RX sweep, as
        // characterized for the reference die.
        ("CAL_SWEEP_COARSE_START", ("u8", "23")),
        ("CAL_SWEEP_COARSE_END", ("u8", "23")),
        ("CAL_SWEEP_MID_CODE", ("u8", "29")),
        // Timeouts on the 32 kHz counter.
        (
            "CAL_RX_TIMEOUT",
            ("Duration", "Duration::from_ticks(16_384)"), // 500 ms
        ),
        (
            "CAL_RX_LONG_TIMEOUT",
            ("Duration", "Duration::from_ticks(65_536)"), // 2 s
        ),
        (
            "CAL_TX_TIMEOUT",
            ("Duration", "Duration::from_ticks(512)"), // 15.625 ms
        ),
        // Peer-side channel range and telemetry channel.
        ("COORD_CHANNEL_START", ("u8", "11")),
        ("COORD_CHANNEL_END", ("u8", "26")),
        ("COORD_TELEMETRY_CHANNEL", ("u8", "17")),
    ]);

    // Make sure we get rerun if needed
    println!("cargo:rerun-if-changed=build.rs");
    for name in configs.keys() {
        println!("cargo:rerun-if-env-changed=LCTUNE_{name}");
    }

    // Collect environment variables
    let mut data = String::new();
    // Write preamble
    writeln!(data, "use crate::time::Duration;").unwrap();

    for (var, value) in std::env::vars() {
        if let Some(name) = var.strip_prefix("LCTUNE_") {
            // discard from hashmap as a way of consuming the setting
            let Some((_, (ty, _))) = configs.remove_entry(name) else {
                panic!("Wrong configuration name {name}");
            };

            // write to file
            writeln!(data, "pub const {name}: {ty} = {value};").unwrap();
        }
    }

    // Take the remaining configs and write the default value to the file
    for (name, (ty, value)) in configs.iter() {
        writeln!(data, "pub const {name}: {ty} = {value};").unwrap();
    }

    // Now that we have the code of the configuration, actually write it to a file
    let out_dir = PathBuf::from(env::var_os("OUT_DIR").unwrap());
    let out_file = out_dir.join("config.rs");
    std::fs::write(out_file, data).unwrap();
}
